use std::collections::HashMap;
use std::convert::Infallible;

use crate::models::SchedulingState;
use crate::rating::Rating;

/// Loads and saves scheduling state per (learner, item) pair.
///
/// The scheduler never touches a store itself: callers load, call
/// `schedule`, then save.
pub trait StateStore {
    type Error;

    /// `None` when the learner has never been shown the item.
    fn load_state(
        &self,
        learner_id: &str,
        item_id: i64,
    ) -> Result<Option<SchedulingState>, Self::Error>;

    fn save_state(
        &mut self,
        learner_id: &str,
        item_id: i64,
        state: &SchedulingState,
    ) -> Result<(), Self::Error>;

    /// Persists the state produced by a review. Stores that keep a review
    /// history override this to record `rating` alongside.
    fn save_review(
        &mut self,
        learner_id: &str,
        item_id: i64,
        _rating: Rating,
        state: &SchedulingState,
    ) -> Result<(), Self::Error> {
        self.save_state(learner_id, item_id, state)
    }

    /// True when `error` means another writer stored a newer review first.
    /// Callers can skip the item instead of failing.
    fn is_conflict(&self, _error: &Self::Error) -> bool {
        false
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    states: HashMap<(String, i64), SchedulingState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl StateStore for MemoryStore {
    type Error = Infallible;

    fn load_state(
        &self,
        learner_id: &str,
        item_id: i64,
    ) -> Result<Option<SchedulingState>, Self::Error> {
        Ok(self
            .states
            .get(&(learner_id.to_string(), item_id))
            .cloned())
    }

    fn save_state(
        &mut self,
        learner_id: &str,
        item_id: i64,
        state: &SchedulingState,
    ) -> Result<(), Self::Error> {
        self.states
            .insert((learner_id.to_string(), item_id), state.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn missing_state_loads_as_none() {
        let store = MemoryStore::new();
        assert_eq!(store.load_state("ana", 1).unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let mut store = MemoryStore::new();
        let state = SchedulingState::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        store.save_state("ana", 1, &state).unwrap();
        assert_eq!(store.load_state("ana", 1).unwrap(), Some(state));
    }

    #[test]
    fn learners_are_isolated() {
        let mut store = MemoryStore::new();
        let state = SchedulingState::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        store.save_state("ana", 1, &state).unwrap();
        assert_eq!(store.load_state("ben", 1).unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_review_defaults_to_save_state() {
        let mut store = MemoryStore::new();
        let state = SchedulingState::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        store.save_review("ana", 2, Rating::Good, &state).unwrap();
        assert_eq!(store.load_state("ana", 2).unwrap(), Some(state));
    }

    #[test]
    fn memory_store_is_last_call_wins() {
        let mut store = MemoryStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let reviewed = crate::scheduler::schedule(&SchedulingState::new(t0), Rating::Good, t0);
        let fresh = SchedulingState::new(t0);
        store.save_review("ana", 2, Rating::Good, &reviewed).unwrap();
        store.save_review("ana", 2, Rating::Again, &fresh).unwrap();
        assert_eq!(store.load_state("ana", 2).unwrap(), Some(fresh));
    }
}
