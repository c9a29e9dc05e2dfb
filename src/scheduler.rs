//! SM-2 style review scheduling.
//!
//! Transition rules for one review:
//! - `Again` resets the streak, drops the ease factor and brings the item
//!   back after the first interval.
//! - `Hard`, `Good` and `Easy` extend the streak. The interval is the first
//!   interval on the first success, the second interval on the second, and
//!   the previous interval times the (adjusted) ease factor afterwards.
//!   `Hard` then shrinks that interval, `Easy` stretches it.
//! - The ease factor never drops below the policy minimum.
//!
//! Everything here is pure: the caller supplies `now` and owns persistence.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{SchedulingState, DEFAULT_EASE};
use crate::rating::Rating;

/// Upper bound accepted for `maximum_interval`, roughly a millennium.
pub const INTERVAL_CEILING: u32 = 365_000;

/// Tunable constants of the transition function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerPolicy {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    pub again_ease_penalty: f64,
    pub hard_ease_penalty: f64,
    pub easy_ease_bonus: f64,
    /// Interval after the first success, and after a lapse.
    pub first_interval: u32,
    pub second_interval: u32,
    pub hard_interval_multiplier: f64,
    pub easy_interval_multiplier: f64,
    pub maximum_interval: u32,
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self {
            initial_ease: DEFAULT_EASE,
            minimum_ease: 1.3,
            again_ease_penalty: 0.20,
            hard_ease_penalty: 0.15,
            easy_ease_bonus: 0.15,
            first_interval: 1,
            second_interval: 6,
            hard_interval_multiplier: 0.8,
            easy_interval_multiplier: 1.3,
            maximum_interval: 36_500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolicyError {
    #[error("{field} must be a finite number greater than zero (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be a finite, non-negative number (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("initial_ease {initial} is below minimum_ease {minimum}")]
    InitialBelowMinimum { initial: f64, minimum: f64 },
    #[error("{field} must be at least one day")]
    ZeroInterval { field: &'static str },
    #[error("maximum_interval {maximum} must lie between second_interval {second} and {ceiling}")]
    MaximumOutOfRange {
        maximum: u32,
        second: u32,
        ceiling: u32,
    },
}

impl SchedulerPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        let positive = [
            ("minimum_ease", self.minimum_ease),
            ("initial_ease", self.initial_ease),
            ("hard_interval_multiplier", self.hard_interval_multiplier),
            ("easy_interval_multiplier", self.easy_interval_multiplier),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PolicyError::NotPositive { field, value });
            }
        }

        let non_negative = [
            ("again_ease_penalty", self.again_ease_penalty),
            ("hard_ease_penalty", self.hard_ease_penalty),
            ("easy_ease_bonus", self.easy_ease_bonus),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PolicyError::Negative { field, value });
            }
        }

        if self.initial_ease < self.minimum_ease {
            return Err(PolicyError::InitialBelowMinimum {
                initial: self.initial_ease,
                minimum: self.minimum_ease,
            });
        }
        if self.first_interval == 0 {
            return Err(PolicyError::ZeroInterval {
                field: "first_interval",
            });
        }
        if self.second_interval == 0 {
            return Err(PolicyError::ZeroInterval {
                field: "second_interval",
            });
        }
        if self.maximum_interval < self.second_interval
            || self.maximum_interval < self.first_interval
            || self.maximum_interval > INTERVAL_CEILING
        {
            return Err(PolicyError::MaximumOutOfRange {
                maximum: self.maximum_interval,
                second: self.second_interval,
                ceiling: INTERVAL_CEILING,
            });
        }
        Ok(())
    }
}

/// What a single rating would do to an item, for button hints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingPreview {
    pub rating: Rating,
    pub interval: u32,
    pub next_review: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scheduler {
    policy: SchedulerPolicy,
}

impl Scheduler {
    pub fn new(policy: SchedulerPolicy) -> Result<Self, PolicyError> {
        policy.validate()?;
        Ok(Self { policy })
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }

    /// Fresh state for an item presented for the first time.
    pub fn initial_state(&self, now: DateTime<Utc>) -> SchedulingState {
        SchedulingState::with_ease(now, self.policy.initial_ease)
    }

    /// Applies one review to `state` and returns the resulting state.
    ///
    /// `state` is assumed valid (see [`SchedulingState::validate`]); nothing
    /// is clamped on the way in.
    pub fn schedule(
        &self,
        state: &SchedulingState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> SchedulingState {
        let p = &self.policy;

        let (repetitions, ease_factor, interval) = if !rating.is_success() {
            (
                0,
                (state.ease_factor - p.again_ease_penalty).max(p.minimum_ease),
                p.first_interval,
            )
        } else {
            let repetitions = state.repetitions.saturating_add(1);
            let ease_factor = match rating {
                Rating::Hard => (state.ease_factor - p.hard_ease_penalty).max(p.minimum_ease),
                Rating::Easy => state.ease_factor + p.easy_ease_bonus,
                _ => state.ease_factor,
            };

            let base = match repetitions {
                1 => p.first_interval as f64,
                2 => p.second_interval as f64,
                _ => (state.interval as f64 * ease_factor).round(),
            };
            let adjusted = match rating {
                Rating::Hard => (base * p.hard_interval_multiplier).round(),
                Rating::Easy => (base * p.easy_interval_multiplier).round(),
                _ => base,
            };

            (repetitions, ease_factor, self.clamp_interval(adjusted))
        };

        SchedulingState {
            interval,
            ease_factor,
            repetitions,
            next_review: now + Duration::days(i64::from(interval)),
            last_review: Some(now),
        }
    }

    /// Outcome of each rating in severity order, without committing any.
    pub fn preview(&self, state: &SchedulingState, now: DateTime<Utc>) -> Vec<RatingPreview> {
        Rating::ALL
            .into_iter()
            .map(|rating| {
                let next = self.schedule(state, rating, now);
                RatingPreview {
                    rating,
                    interval: next.interval,
                    next_review: next.next_review,
                }
            })
            .collect()
    }

    fn clamp_interval(&self, days: f64) -> u32 {
        days.clamp(1.0, self.policy.maximum_interval as f64) as u32
    }
}

/// [`Scheduler::schedule`] under the default policy.
pub fn schedule(state: &SchedulingState, rating: Rating, now: DateTime<Utc>) -> SchedulingState {
    Scheduler::default().schedule(state, rating, now)
}
