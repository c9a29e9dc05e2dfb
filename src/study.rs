//! Line-oriented study session over the due queue.
//!
//! Each word is shown term-first. An empty line reveals the answer, a rating
//! token grades the word and moves on, `q` ends the session. Tokens that are
//! not ratings are reported and ignored, leaving the word ungraded.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::{BufRead, Write};

use crate::models::{SchedulingState, WordWithState};
use crate::rating::{parse_rating, Rating};
use crate::scheduler::Scheduler;
use crate::store::StateStore;

#[derive(Debug, thiserror::Error)]
pub enum StudyError<E> {
    #[error("Terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to persist review: {0}")]
    Store(E),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StudySummary {
    pub reviewed: usize,
    pub again: usize,
    pub hard: usize,
    pub good: usize,
    pub easy: usize,
    /// Words left unreviewed, either when the session ended or because
    /// another writer reviewed them first.
    pub skipped: usize,
}

impl StudySummary {
    fn record(&mut self, rating: Rating) {
        self.reviewed += 1;
        match rating {
            Rating::Again => self.again += 1,
            Rating::Hard => self.hard += 1,
            Rating::Good => self.good += 1,
            Rating::Easy => self.easy += 1,
        }
    }
}

enum Step {
    Rated,
    Skipped,
    Quit,
}

pub struct StudySession<'a, S: StateStore> {
    store: &'a mut S,
    scheduler: &'a Scheduler,
    learner_id: &'a str,
    now: DateTime<Utc>,
}

impl<'a, S: StateStore> StudySession<'a, S> {
    pub fn new(
        store: &'a mut S,
        scheduler: &'a Scheduler,
        learner_id: &'a str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            store,
            scheduler,
            learner_id,
            now,
        }
    }

    /// Walks `queue` in order, reading answers from `input`.
    /// End of input ends the session like `q`.
    pub fn run<R: BufRead, W: Write>(
        &mut self,
        queue: &[WordWithState],
        mut input: R,
        mut output: W,
    ) -> Result<StudySummary, StudyError<S::Error>> {
        let mut summary = StudySummary::default();

        if queue.is_empty() {
            writeln!(output, "Nothing due. Come back later!")?;
            return Ok(summary);
        }

        for (idx, item) in queue.iter().enumerate() {
            let step =
                self.study_word(idx, queue.len(), item, &mut input, &mut output, &mut summary)?;
            match step {
                Step::Rated => {}
                Step::Skipped => summary.skipped += 1,
                Step::Quit => {
                    summary.skipped += queue.len() - idx;
                    break;
                }
            }
        }

        writeln!(output)?;
        writeln!(
            output,
            "Session done: {} reviewed ({} again, {} hard, {} good, {} easy)",
            summary.reviewed, summary.again, summary.hard, summary.good, summary.easy
        )?;
        tracing::info!(
            learner_id = self.learner_id,
            reviewed = summary.reviewed,
            skipped = summary.skipped,
            "study session finished"
        );
        Ok(summary)
    }

    fn study_word<R: BufRead, W: Write>(
        &mut self,
        idx: usize,
        total: usize,
        item: &WordWithState,
        input: &mut R,
        output: &mut W,
        summary: &mut StudySummary,
    ) -> Result<Step, StudyError<S::Error>> {
        let word = &item.word;
        let state = self
            .store
            .load_state(self.learner_id, word.id)
            .map_err(StudyError::Store)?
            .unwrap_or_else(|| item.state.clone());
        // A review stored after the session started moves the clock forward.
        let now = state.last_review.map_or(self.now, |last| last.max(self.now));

        writeln!(output)?;
        writeln!(output, "[{}/{}] {}", idx + 1, total, word.term)?;
        if let Some(p) = &word.pronunciation {
            writeln!(output, "      {}", p)?;
        }
        writeln!(output, "(Enter to reveal, 1-4 to rate, q to quit)")?;

        let mut revealed = false;
        let mut line = String::new();
        loop {
            write!(output, "> ")?;
            output.flush()?;

            line.clear();
            if input.read_line(&mut line)? == 0 {
                return Ok(Step::Quit);
            }

            match line.trim() {
                "" if !revealed => {
                    revealed = true;
                    self.reveal(item, &state, now, output)?;
                }
                "" => {
                    writeln!(output, "Rate it: 1 again, 2 hard, 3 good, 4 easy")?;
                }
                "q" | "quit" => return Ok(Step::Quit),
                token => match parse_rating(token) {
                    Ok(rating) => {
                        let next = self.scheduler.schedule(&state, rating, now);
                        if let Err(err) =
                            self.store.save_review(self.learner_id, word.id, rating, &next)
                        {
                            if !self.store.is_conflict(&err) {
                                return Err(StudyError::Store(err));
                            }
                            tracing::warn!(word_id = word.id, "review lost to a newer write");
                            writeln!(
                                output,
                                "'{}' was reviewed elsewhere meanwhile, skipping",
                                word.term
                            )?;
                            return Ok(Step::Skipped);
                        }
                        summary.record(rating);
                        writeln!(
                            output,
                            "{} - next review in {} {}",
                            rating,
                            next.interval,
                            days(next.interval)
                        )?;
                        return Ok(Step::Rated);
                    }
                    Err(err) => {
                        tracing::debug!(token, "ignored invalid rating input");
                        writeln!(output, "{}", err)?;
                    }
                },
            }
        }
    }

    fn reveal<W: Write>(
        &self,
        item: &WordWithState,
        state: &SchedulingState,
        now: DateTime<Utc>,
        output: &mut W,
    ) -> std::io::Result<()> {
        let word = &item.word;
        writeln!(
            output,
            "  = {}",
            word.definition.as_deref().unwrap_or("(no definition)")
        )?;
        if let Some(example) = &word.example {
            writeln!(output, "  e.g. {}", example)?;
        }
        let hints: Vec<String> = self
            .scheduler
            .preview(state, now)
            .iter()
            .map(|p| format!("{} {} ({}d)", p.rating.digit(), p.rating, p.interval))
            .collect();
        writeln!(output, "  {}", hints.join("  "))
    }
}

fn days(n: u32) -> &'static str {
    if n == 1 {
        "day"
    } else {
        "days"
    }
}
