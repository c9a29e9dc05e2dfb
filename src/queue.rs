//! Selection and ordering of items due in a study session.

use chrono::{DateTime, Utc};

use crate::models::SchedulingState;

/// Returns the items due at `now`, most overdue first.
///
/// Ties on `next_review` go to the item with fewer repetitions; remaining
/// ties keep input order. `limit` truncates after ordering. Items are passed
/// through untouched, so any payload type works.
pub fn build_queue<T>(
    items: impl IntoIterator<Item = (T, SchedulingState)>,
    now: DateTime<Utc>,
    limit: Option<usize>,
) -> Vec<T> {
    let mut due: Vec<(T, SchedulingState)> = items
        .into_iter()
        .filter(|(_, state)| state.is_due(now))
        .collect();

    due.sort_by(|(_, a), (_, b)| {
        a.next_review
            .cmp(&b.next_review)
            .then(a.repetitions.cmp(&b.repetitions))
    });

    let take = limit.unwrap_or(due.len());
    due.into_iter().take(take).map(|(item, _)| item).collect()
}

pub fn due_count<'a>(
    states: impl IntoIterator<Item = &'a SchedulingState>,
    now: DateTime<Utc>,
) -> usize {
    states.into_iter().filter(|s| s.is_due(now)).count()
}
