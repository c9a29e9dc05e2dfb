use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::rating::Rating;

/// Interval (days) at or beyond which a word counts as mastered.
pub const MASTERED_INTERVAL_DAYS: u32 = 21;

/// Ease factor given to a freshly created scheduling state.
pub const DEFAULT_EASE: f64 = 2.5;

/// A word or phrase being learned. Everything past `id` is display content
/// and is never inspected by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabItem {
    pub id: i64,
    pub term: String,
    pub definition: Option<String>,
    pub example: Option<String>,
    pub pronunciation: Option<String>,
    pub created_at: String,
}

/// Per-learner scheduling data for one [`VocabItem`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    /// Days until the next review.
    pub interval: u32,
    pub ease_factor: f64,
    /// Consecutive reviews not rated `Again`.
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
    pub last_review: Option<DateTime<Utc>>,
}

impl SchedulingState {
    /// State for an item the learner has never seen; due immediately.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_ease(now, DEFAULT_EASE)
    }

    pub fn with_ease(now: DateTime<Utc>, ease_factor: f64) -> Self {
        Self {
            interval: 1,
            ease_factor,
            repetitions: 0,
            next_review: now,
            last_review: None,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }

    /// How long past its review date the item is. Zero when not yet due.
    pub fn overdue_by(&self, now: DateTime<Utc>) -> Duration {
        (now - self.next_review).max(Duration::zero())
    }

    pub fn mastery(&self) -> Mastery {
        if self.last_review.is_none() {
            Mastery::New
        } else if self.repetitions < 2 {
            Mastery::Learning
        } else if self.interval >= MASTERED_INTERVAL_DAYS {
            Mastery::Mastered
        } else {
            Mastery::Reviewing
        }
    }

    /// Load-time integrity check for state read back from storage.
    ///
    /// Rejects rather than repairs: a state that fails here was corrupted
    /// outside the scheduler and must not be fed back into it.
    pub fn validate(&self, minimum_ease: f64) -> Result<(), StateError> {
        if !self.ease_factor.is_finite() {
            return Err(StateError::NonFiniteEase(self.ease_factor));
        }
        if self.ease_factor < minimum_ease {
            return Err(StateError::EaseBelowMinimum {
                ease: self.ease_factor,
                minimum: minimum_ease,
            });
        }
        if let Some(last) = self.last_review {
            if self.next_review < last {
                return Err(StateError::ReviewOrder {
                    last_review: last,
                    next_review: self.next_review,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("ease factor {0} is not a finite number")]
    NonFiniteEase(f64),
    #[error("ease factor {ease} is below the minimum of {minimum}")]
    EaseBelowMinimum { ease: f64, minimum: f64 },
    #[error("{field} value {value} is out of range")]
    OutOfRange { field: &'static str, value: i64 },
    #[error("next review {next_review} precedes last review {last_review}")]
    ReviewOrder {
        last_review: DateTime<Utc>,
        next_review: DateTime<Utc>,
    },
}

// Coarse progress buckets shown next to a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mastery {
    New,
    Learning,
    Reviewing,
    Mastered,
}

impl Mastery {
    pub fn label(&self) -> &'static str {
        match self {
            Mastery::New => "New",
            Mastery::Learning => "Learning",
            Mastery::Reviewing => "Reviewing",
            Mastery::Mastered => "Mastered",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordWithState {
    pub word: VocabItem,
    pub state: SchedulingState,
    pub mastery: Mastery,
}

impl WordWithState {
    pub fn new(word: VocabItem, state: SchedulingState) -> Self {
        let mastery = state.mastery();
        Self {
            word,
            state,
            mastery,
        }
    }
}

/// One row of a learner's review history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub word_id: i64,
    pub rating: Rating,
    pub reviewed_at: DateTime<Utc>,
    pub interval: u32,
    pub ease_factor: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_words: i64,
    pub total_reviews: i64,
    pub due_now: i64,
    pub new: i64,
    pub learning: i64,
    pub reviewing: i64,
    pub mastered: i64,
    pub avg_ease: f64,
}

// JSON output wrapper for CLI
#[derive(Debug, Serialize)]
pub struct JsonOutput<T: Serialize> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> JsonOutput<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}
