//! Spaced-repetition scheduling for vocabulary flashcards.
//!
//! The core is three pure pieces: [`parse_rating`] turns raw input into a
//! [`Rating`], [`Scheduler::schedule`] applies a rating to a
//! [`SchedulingState`], and [`build_queue`] picks and orders the items due
//! for a session. [`StateStore`] is the contract for persisting state;
//! [`db::Database`] implements it over SQLite.

pub mod config;
pub mod db;
pub mod models;
pub mod queue;
pub mod rating;
pub mod scheduler;
pub mod store;
pub mod study;

pub use models::{Mastery, SchedulingState, StateError, VocabItem, WordWithState};
pub use queue::{build_queue, due_count};
pub use rating::{parse_rating, InvalidRatingError, Rating};
pub use scheduler::{schedule, PolicyError, RatingPreview, Scheduler, SchedulerPolicy};
pub use store::{MemoryStore, StateStore};
