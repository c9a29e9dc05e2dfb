use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use crate::models::{
    Mastery, ReviewRecord, SchedulingState, StateError, Stats, VocabItem, WordWithState,
};
use crate::queue::{build_queue, due_count};
use crate::rating::{parse_rating, Rating};
use crate::scheduler::Scheduler;
use crate::store::StateStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Invalid timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("Corrupt scheduling state for word {word_id}: {source}")]
    CorruptState {
        word_id: i64,
        #[source]
        source: StateError,
    },
    #[error("Unknown rating '{0}' in review history")]
    CorruptRating(String),
    #[error("Stale write for word {word_id}: a newer review is already stored")]
    StaleState { word_id: i64 },
    #[error("Word not found: {0}")]
    WordNotFound(i64),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub struct Database {
    conn: Connection,
    minimum_ease: f64,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn,
            minimum_ease: Scheduler::default().policy().minimum_ease,
        })
    }

    /// Ease floor enforced when reading state back.
    pub fn with_minimum_ease(mut self, minimum_ease: f64) -> Self {
        self.minimum_ease = minimum_ease;
        self
    }

    pub fn init(&self) -> StoreResult<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                term TEXT NOT NULL UNIQUE,
                definition TEXT,
                example TEXT,
                pronunciation TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            -- One row per (learner, word) once the word has been presented
            CREATE TABLE IF NOT EXISTS scheduling_states (
                learner_id TEXT NOT NULL,
                word_id INTEGER NOT NULL,
                interval_days INTEGER NOT NULL DEFAULT 1,
                ease_factor REAL NOT NULL DEFAULT 2.5,
                repetitions INTEGER NOT NULL DEFAULT 0,
                next_review TEXT NOT NULL,
                last_review TEXT,
                PRIMARY KEY (learner_id, word_id),
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS review_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                learner_id TEXT NOT NULL,
                word_id INTEGER NOT NULL,
                rating TEXT NOT NULL CHECK(rating IN ('again', 'hard', 'good', 'easy')),
                reviewed_at TEXT NOT NULL,
                interval_days INTEGER NOT NULL,
                ease_factor REAL NOT NULL,
                FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_states_next_review ON scheduling_states(learner_id, next_review);
            CREATE INDEX IF NOT EXISTS idx_history_word ON review_history(learner_id, word_id);
            "#,
        )?;
        Ok(())
    }

    // Word operations
    pub fn add_word(
        &self,
        term: &str,
        definition: Option<&str>,
        example: Option<&str>,
        pronunciation: Option<&str>,
    ) -> StoreResult<i64> {
        self.conn.execute(
            "INSERT INTO words (term, definition, example, pronunciation) VALUES (?1, ?2, ?3, ?4)",
            params![term, definition, example, pronunciation],
        )?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(word_id = id, term, "added word");
        Ok(id)
    }

    pub fn get_word(&self, id: i64) -> StoreResult<Option<VocabItem>> {
        let word = self
            .conn
            .query_row(
                "SELECT id, term, definition, example, pronunciation, created_at FROM words WHERE id = ?1",
                params![id],
                word_from_row,
            )
            .optional()?;
        Ok(word)
    }

    /// Like [`Database::get_word`], but a missing word is an error.
    pub fn require_word(&self, id: i64) -> StoreResult<VocabItem> {
        self.get_word(id)?.ok_or(StoreError::WordNotFound(id))
    }

    pub fn list_words(&self) -> StoreResult<Vec<VocabItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, term, definition, example, pronunciation, created_at FROM words ORDER BY term",
        )?;
        let rows = stmt.query_map([], word_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_word(&self, id: i64) -> StoreResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM words WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Every word paired with the learner's stored state, if any.
    pub fn list_words_with_states(
        &self,
        learner_id: &str,
    ) -> StoreResult<Vec<(VocabItem, Option<SchedulingState>)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT w.id, w.term, w.definition, w.example, w.pronunciation, w.created_at,
                   s.interval_days, s.ease_factor, s.repetitions, s.next_review, s.last_review
            FROM words w
            LEFT JOIN scheduling_states s ON s.word_id = w.id AND s.learner_id = ?1
            ORDER BY w.term
            "#,
        )?;

        let rows = stmt.query_map(params![learner_id], |row| {
            let word = word_from_row(row)?;
            let state_row = match row.get::<_, Option<String>>(9)? {
                Some(next_review) => Some(StateRow {
                    interval: row.get(6)?,
                    ease_factor: row.get(7)?,
                    repetitions: row.get(8)?,
                    next_review,
                    last_review: row.get(10)?,
                }),
                None => None,
            };
            Ok((word, state_row))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (word, state_row) = row?;
            let state = match state_row {
                Some(r) => Some(r.into_state(word.id, self.minimum_ease)?),
                None => None,
            };
            result.push((word, state));
        }
        Ok(result)
    }

    /// Words due for `learner_id` at `now`, queue-ordered. Words never shown
    /// to the learner get the scheduler's initial state and are due at once.
    pub fn due_words(
        &self,
        learner_id: &str,
        scheduler: &Scheduler,
        now: DateTime<Utc>,
        limit: Option<usize>,
    ) -> StoreResult<Vec<WordWithState>> {
        let items = self
            .list_words_with_states(learner_id)?
            .into_iter()
            .map(|(word, state)| {
                let state = state.unwrap_or_else(|| scheduler.initial_state(now));
                (WordWithState::new(word, state.clone()), state)
            });
        let queue = build_queue(items, now, limit);
        tracing::debug!(learner_id, due = queue.len(), "built due queue");
        Ok(queue)
    }

    pub fn review_history(&self, learner_id: &str, word_id: i64) -> StoreResult<Vec<ReviewRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT word_id, rating, reviewed_at, interval_days, ease_factor
            FROM review_history
            WHERE learner_id = ?1 AND word_id = ?2
            ORDER BY reviewed_at, id
            "#,
        )?;
        let rows = stmt.query_map(params![learner_id, word_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, f64>(4)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (word_id, rating, reviewed_at, interval, ease_factor) = row?;
            let rating = parse_rating(&rating).map_err(|e| StoreError::CorruptRating(e.token))?;
            let interval = u32::try_from(interval).map_err(|_| StoreError::CorruptState {
                word_id,
                source: StateError::OutOfRange {
                    field: "interval_days",
                    value: interval,
                },
            })?;
            records.push(ReviewRecord {
                word_id,
                rating,
                reviewed_at: parse_timestamp(&reviewed_at)?,
                interval,
                ease_factor,
            });
        }
        Ok(records)
    }

    pub fn get_stats(&self, learner_id: &str, now: DateTime<Utc>) -> StoreResult<Stats> {
        let total_reviews: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM review_history WHERE learner_id = ?1",
            params![learner_id],
            |row| row.get(0),
        )?;

        let mut stats = Stats {
            total_reviews,
            ..Stats::default()
        };
        let mut ease_sum = 0.0;
        let mut ease_count = 0usize;
        let mut stored = Vec::new();

        for (_, state) in self.list_words_with_states(learner_id)? {
            stats.total_words += 1;
            let Some(state) = state else {
                // unseen words are new and due immediately
                stats.new += 1;
                stats.due_now += 1;
                continue;
            };
            match state.mastery() {
                Mastery::New => stats.new += 1,
                Mastery::Learning => stats.learning += 1,
                Mastery::Reviewing => stats.reviewing += 1,
                Mastery::Mastered => stats.mastered += 1,
            }
            if state.last_review.is_some() {
                ease_sum += state.ease_factor;
                ease_count += 1;
            }
            stored.push(state);
        }
        stats.due_now += due_count(&stored, now) as i64;

        if ease_count > 0 {
            stats.avg_ease = ease_sum / ease_count as f64;
        }
        Ok(stats)
    }
}

impl StateStore for Database {
    type Error = StoreError;

    fn load_state(&self, learner_id: &str, item_id: i64) -> StoreResult<Option<SchedulingState>> {
        let row = self
            .conn
            .query_row(
                r#"
                SELECT interval_days, ease_factor, repetitions, next_review, last_review
                FROM scheduling_states
                WHERE learner_id = ?1 AND word_id = ?2
                "#,
                params![learner_id, item_id],
                |row| {
                    Ok(StateRow {
                        interval: row.get(0)?,
                        ease_factor: row.get(1)?,
                        repetitions: row.get(2)?,
                        next_review: row.get(3)?,
                        last_review: row.get(4)?,
                    })
                },
            )
            .optional()?;

        row.map(|r| r.into_state(item_id, self.minimum_ease))
            .transpose()
    }

    fn save_state(
        &mut self,
        learner_id: &str,
        item_id: i64,
        state: &SchedulingState,
    ) -> StoreResult<()> {
        upsert_state(&self.conn, learner_id, item_id, state)
    }

    fn save_review(
        &mut self,
        learner_id: &str,
        item_id: i64,
        rating: Rating,
        state: &SchedulingState,
    ) -> StoreResult<()> {
        let reviewed_at = state.last_review.ok_or(StoreError::CorruptState {
            word_id: item_id,
            source: StateError::OutOfRange {
                field: "last_review",
                value: 0,
            },
        })?;

        let tx = self.conn.transaction()?;
        upsert_state(&tx, learner_id, item_id, state)?;
        tx.execute(
            r#"
            INSERT INTO review_history (learner_id, word_id, rating, reviewed_at, interval_days, ease_factor)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                learner_id,
                item_id,
                rating.as_str(),
                format_timestamp(reviewed_at),
                state.interval,
                state.ease_factor
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            learner_id,
            word_id = item_id,
            rating = rating.as_str(),
            interval = state.interval,
            "recorded review"
        );
        Ok(())
    }

    fn is_conflict(&self, error: &StoreError) -> bool {
        matches!(error, StoreError::StaleState { .. })
    }
}

// Writes are last-write-wins on last_review: an update carrying an older
// review than the stored one is refused.
fn upsert_state(
    conn: &Connection,
    learner_id: &str,
    item_id: i64,
    state: &SchedulingState,
) -> StoreResult<()> {
    let changed = conn.execute(
        r#"
        INSERT INTO scheduling_states
            (learner_id, word_id, interval_days, ease_factor, repetitions, next_review, last_review)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(learner_id, word_id) DO UPDATE SET
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            repetitions = excluded.repetitions,
            next_review = excluded.next_review,
            last_review = excluded.last_review
        WHERE scheduling_states.last_review IS NULL
           OR excluded.last_review >= scheduling_states.last_review
        "#,
        params![
            learner_id,
            item_id,
            state.interval,
            state.ease_factor,
            state.repetitions,
            format_timestamp(state.next_review),
            state.last_review.map(format_timestamp),
        ],
    )?;

    if changed == 0 {
        tracing::warn!(learner_id, word_id = item_id, "rejected stale state write");
        return Err(StoreError::StaleState { word_id: item_id });
    }
    Ok(())
}

struct StateRow {
    interval: i64,
    ease_factor: f64,
    repetitions: i64,
    next_review: String,
    last_review: Option<String>,
}

impl StateRow {
    fn into_state(self, word_id: i64, minimum_ease: f64) -> StoreResult<SchedulingState> {
        let corrupt = |source| StoreError::CorruptState { word_id, source };

        let interval = u32::try_from(self.interval).map_err(|_| {
            corrupt(StateError::OutOfRange {
                field: "interval_days",
                value: self.interval,
            })
        })?;
        let repetitions = u32::try_from(self.repetitions).map_err(|_| {
            corrupt(StateError::OutOfRange {
                field: "repetitions",
                value: self.repetitions,
            })
        })?;

        let state = SchedulingState {
            interval,
            ease_factor: self.ease_factor,
            repetitions,
            next_review: parse_timestamp(&self.next_review)?,
            last_review: self.last_review.as_deref().map(parse_timestamp).transpose()?,
        };
        state.validate(minimum_ease).map_err(corrupt)?;
        Ok(state)
    }
}

fn word_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<VocabItem> {
    Ok(VocabItem {
        id: row.get(0)?,
        term: row.get(1)?,
        definition: row.get(2)?,
        example: row.get(3)?,
        pronunciation: row.get(4)?,
        created_at: row.get(5)?,
    })
}

// Fixed-width so stored timestamps compare correctly as text
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(s: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidTimestamp(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::schedule;
    use chrono::{Duration, TimeZone};

    fn setup_db() -> Database {
        let db = Database::open(":memory:").expect("Failed to create in-memory database");
        db.init().expect("Failed to initialize database");
        db
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn add(db: &Database, term: &str) -> i64 {
        db.add_word(term, Some("meaning"), None, None).unwrap()
    }

    mod init_tests {
        use super::*;

        #[test]
        fn init_creates_tables() {
            let db = setup_db();
            for table in ["words", "scheduling_states", "review_history"] {
                let count: i64 = db
                    .conn
                    .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                    .expect("table should exist");
                assert_eq!(count, 0);
            }
        }

        #[test]
        fn init_is_idempotent() {
            let db = setup_db();
            add(&db, "ephemeral");
            db.init().expect("Re-init should succeed");
            assert_eq!(db.list_words().unwrap().len(), 1);
        }
    }

    mod word_tests {
        use super::*;

        #[test]
        fn add_and_get_word() {
            let db = setup_db();
            let id = db
                .add_word(
                    "ubiquitous",
                    Some("found everywhere"),
                    Some("Phones are ubiquitous."),
                    Some("/juːˈbɪkwɪtəs/"),
                )
                .unwrap();
            let word = db.get_word(id).unwrap().unwrap();
            assert_eq!(word.term, "ubiquitous");
            assert_eq!(word.definition.as_deref(), Some("found everywhere"));
            assert_eq!(word.example.as_deref(), Some("Phones are ubiquitous."));
            assert_eq!(word.pronunciation.as_deref(), Some("/juːˈbɪkwɪtəs/"));
        }

        #[test]
        fn get_word_not_found() {
            let db = setup_db();
            assert!(db.get_word(999).unwrap().is_none());
        }

        #[test]
        fn require_word_reports_unknown_id() {
            let db = setup_db();
            let id = add(&db, "lucid");
            assert_eq!(db.require_word(id).unwrap().term, "lucid");
            assert!(matches!(
                db.require_word(999),
                Err(StoreError::WordNotFound(999))
            ));
        }

        #[test]
        fn duplicate_term_fails() {
            let db = setup_db();
            add(&db, "same");
            assert!(db.add_word("same", None, None, None).is_err());
        }

        #[test]
        fn list_words_sorted_by_term() {
            let db = setup_db();
            add(&db, "zeal");
            add(&db, "apt");
            add(&db, "mellow");
            let terms: Vec<String> = db.list_words().unwrap().into_iter().map(|w| w.term).collect();
            assert_eq!(terms, vec!["apt", "mellow", "zeal"]);
        }

        #[test]
        fn delete_word_cascades_state_and_history() {
            let mut db = setup_db();
            let id = add(&db, "fleeting");
            let state = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            db.save_review("ana", id, Rating::Good, &state).unwrap();

            assert!(db.delete_word(id).unwrap());
            assert!(db.load_state("ana", id).unwrap().is_none());
            assert!(db.review_history("ana", id).unwrap().is_empty());
        }

        #[test]
        fn delete_word_not_found() {
            let db = setup_db();
            assert!(!db.delete_word(42).unwrap());
        }
    }

    mod state_store_tests {
        use super::*;

        #[test]
        fn unseen_word_has_no_state() {
            let db = setup_db();
            let id = add(&db, "novel");
            assert!(db.load_state("ana", id).unwrap().is_none());
        }

        #[test]
        fn save_and_load_roundtrip_preserves_timestamps() {
            let mut db = setup_db();
            let id = add(&db, "novel");
            let now = t0() + Duration::nanoseconds(123_456_789);
            let state = schedule(&SchedulingState::new(now), Rating::Easy, now);
            db.save_state("ana", id, &state).unwrap();
            assert_eq!(db.load_state("ana", id).unwrap(), Some(state));
        }

        #[test]
        fn states_are_per_learner() {
            let mut db = setup_db();
            let id = add(&db, "novel");
            let state = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            db.save_state("ana", id, &state).unwrap();
            assert!(db.load_state("ben", id).unwrap().is_none());
        }

        #[test]
        fn newer_review_overwrites() {
            let mut db = setup_db();
            let id = add(&db, "novel");
            let first = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            let later = t0() + Duration::days(1);
            let second = schedule(&first, Rating::Good, later);
            db.save_state("ana", id, &first).unwrap();
            db.save_state("ana", id, &second).unwrap();
            assert_eq!(db.load_state("ana", id).unwrap(), Some(second));
        }

        #[test]
        fn older_review_is_rejected_as_stale() {
            let mut db = setup_db();
            let id = add(&db, "novel");
            let first = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            let second = schedule(&first, Rating::Good, t0() + Duration::days(1));
            db.save_state("ana", id, &second).unwrap();

            let err = db.save_state("ana", id, &first).unwrap_err();
            assert!(matches!(err, StoreError::StaleState { word_id } if word_id == id));
            assert!(db.is_conflict(&err));
            assert_eq!(db.load_state("ana", id).unwrap(), Some(second));
        }

        #[test]
        fn only_stale_writes_are_conflicts() {
            let db = setup_db();
            assert!(!db.is_conflict(&StoreError::WordNotFound(1)));
            assert!(!db.is_conflict(&StoreError::InvalidTimestamp("soon".into())));
        }

        #[test]
        fn unreviewed_state_cannot_replace_reviewed_one() {
            let mut db = setup_db();
            let id = add(&db, "novel");
            let reviewed = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            db.save_state("ana", id, &reviewed).unwrap();
            assert!(db.save_state("ana", id, &SchedulingState::new(t0())).is_err());
        }

        #[test]
        fn corrupt_ease_is_rejected_on_load() {
            let db = setup_db();
            let id = add(&db, "novel");
            db.conn
                .execute(
                    "INSERT INTO scheduling_states (learner_id, word_id, interval_days, ease_factor, repetitions, next_review) VALUES ('ana', ?1, 1, 0.9, 0, ?2)",
                    params![id, format_timestamp(t0())],
                )
                .unwrap();
            let err = db.load_state("ana", id).unwrap_err();
            assert!(matches!(
                err,
                StoreError::CorruptState {
                    source: StateError::EaseBelowMinimum { .. },
                    ..
                }
            ));
        }

        #[test]
        fn negative_interval_is_rejected_on_load() {
            let db = setup_db();
            let id = add(&db, "novel");
            db.conn
                .execute(
                    "INSERT INTO scheduling_states (learner_id, word_id, interval_days, ease_factor, repetitions, next_review) VALUES ('ana', ?1, -4, 2.5, 0, ?2)",
                    params![id, format_timestamp(t0())],
                )
                .unwrap();
            assert!(matches!(
                db.load_state("ana", id),
                Err(StoreError::CorruptState { .. })
            ));
        }

        #[test]
        fn garbage_timestamp_is_rejected_on_load() {
            let db = setup_db();
            let id = add(&db, "novel");
            db.conn
                .execute(
                    "INSERT INTO scheduling_states (learner_id, word_id, next_review) VALUES ('ana', ?1, 'yesterday')",
                    params![id],
                )
                .unwrap();
            assert!(matches!(
                db.load_state("ana", id),
                Err(StoreError::InvalidTimestamp(_))
            ));
        }

        #[test]
        fn saving_state_for_unknown_word_fails() {
            let mut db = setup_db();
            let state = SchedulingState::new(t0());
            assert!(db.save_state("ana", 77, &state).is_err());
        }
    }

    mod review_tests {
        use super::*;

        #[test]
        fn save_review_records_history() {
            let mut db = setup_db();
            let id = add(&db, "candid");
            let s1 = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            db.save_review("ana", id, Rating::Good, &s1).unwrap();
            let s2 = schedule(&s1, Rating::Hard, t0() + Duration::days(1));
            db.save_review("ana", id, Rating::Hard, &s2).unwrap();

            let history = db.review_history("ana", id).unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].rating, Rating::Good);
            assert_eq!(history[1].rating, Rating::Hard);
            assert_eq!(history[1].reviewed_at, t0() + Duration::days(1));
            assert_eq!(history[1].interval, s2.interval);
        }

        #[test]
        fn stale_review_leaves_no_history() {
            let mut db = setup_db();
            let id = add(&db, "candid");
            let s1 = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            let s2 = schedule(&s1, Rating::Good, t0() + Duration::days(2));
            db.save_review("ana", id, Rating::Good, &s2).unwrap();
            assert!(db.save_review("ana", id, Rating::Good, &s1).is_err());
            assert_eq!(db.review_history("ana", id).unwrap().len(), 1);
        }

        #[test]
        fn unreviewed_state_is_not_a_review() {
            let mut db = setup_db();
            let id = add(&db, "candid");
            let state = SchedulingState::new(t0());
            assert!(db.save_review("ana", id, Rating::Good, &state).is_err());
        }
    }

    mod due_tests {
        use super::*;

        #[test]
        fn unseen_words_are_due() {
            let db = setup_db();
            add(&db, "alpha");
            add(&db, "beta");
            let due = db.due_words("ana", &Scheduler::default(), t0(), None).unwrap();
            assert_eq!(due.len(), 2);
            assert!(due.iter().all(|w| w.mastery == Mastery::New));
        }

        #[test]
        fn scheduled_words_drop_out_until_due() {
            let mut db = setup_db();
            let id = add(&db, "alpha");
            add(&db, "beta");
            let state = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            db.save_review("ana", id, Rating::Good, &state).unwrap();

            let due = db.due_words("ana", &Scheduler::default(), t0(), None).unwrap();
            let terms: Vec<&str> = due.iter().map(|w| w.word.term.as_str()).collect();
            assert_eq!(terms, vec!["beta"]);

            let tomorrow = t0() + Duration::days(1);
            let due = db.due_words("ana", &Scheduler::default(), tomorrow, None).unwrap();
            assert_eq!(due.len(), 2);
        }

        #[test]
        fn overdue_words_come_first_and_limit_applies() {
            let mut db = setup_db();
            let a = add(&db, "alpha");
            let b = add(&db, "beta");
            add(&db, "gamma");
            let fresh = SchedulingState::new(t0());
            let early = schedule(&fresh, Rating::Good, t0() - Duration::days(5));
            let late = schedule(&fresh, Rating::Good, t0() - Duration::days(2));
            db.save_state("ana", a, &late).unwrap();
            db.save_state("ana", b, &early).unwrap();

            let due = db.due_words("ana", &Scheduler::default(), t0(), Some(2)).unwrap();
            let terms: Vec<&str> = due.iter().map(|w| w.word.term.as_str()).collect();
            assert_eq!(terms, vec!["beta", "alpha"]);
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn stats_empty_db() {
            let db = setup_db();
            let stats = db.get_stats("ana", t0()).unwrap();
            assert_eq!(stats, Stats::default());
        }

        #[test]
        fn stats_counts_buckets() {
            let mut db = setup_db();
            let a = add(&db, "alpha");
            let b = add(&db, "beta");
            add(&db, "gamma");

            let learning = schedule(&SchedulingState::new(t0()), Rating::Good, t0());
            db.save_review("ana", a, Rating::Good, &learning).unwrap();

            let mastered = SchedulingState {
                interval: 30,
                ease_factor: 2.7,
                repetitions: 5,
                next_review: t0() + Duration::days(30),
                last_review: Some(t0()),
            };
            db.save_state("ana", b, &mastered).unwrap();

            let stats = db.get_stats("ana", t0()).unwrap();
            assert_eq!(stats.total_words, 3);
            assert_eq!(stats.total_reviews, 1);
            assert_eq!(stats.new, 1);
            assert_eq!(stats.learning, 1);
            assert_eq!(stats.mastered, 1);
            assert_eq!(stats.due_now, 1);
            assert!((stats.avg_ease - 2.6).abs() < 1e-9);

            let tomorrow = db.get_stats("ana", t0() + Duration::days(1)).unwrap();
            assert_eq!(tomorrow.due_now, 2);
        }
    }
}
