use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vocab_srs::config::{default_learner, Config};
use vocab_srs::db::Database;
use vocab_srs::models::{JsonOutput, SchedulingState, WordWithState};
use vocab_srs::study::StudySession;
use vocab_srs::{parse_rating, Scheduler, StateStore};

#[derive(Parser)]
#[command(name = "vocab")]
#[command(about = "Vocabulary flashcards with spaced-repetition scheduling")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Learner whose progress to use (defaults to $VOCAB_LEARNER or "default")
    #[arg(long, global = true)]
    learner: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage words
    #[command(subcommand)]
    Word(WordCommands),

    /// List words due for review, most overdue first
    Due {
        /// Maximum number of words
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Rate a word and schedule its next review
    Review {
        /// Word ID
        id: i64,

        /// Rating: 1-4 or again/hard/good/easy
        #[arg(long, short)]
        rating: String,
    },

    /// Show the interval each rating would give a word
    Preview {
        /// Word ID
        id: i64,
    },

    /// Show review history for a word
    History {
        /// Word ID
        id: i64,
    },

    /// Study due words interactively
    Study {
        /// Maximum number of words this session
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show learning statistics
    Stats,
}

#[derive(Subcommand)]
enum WordCommands {
    /// List all words with their progress
    List,

    /// Add a new word
    Add {
        /// The word or phrase
        term: String,

        /// Meaning shown on reveal
        #[arg(long, short)]
        definition: Option<String>,

        /// Example sentence
        #[arg(long, short)]
        example: Option<String>,

        /// Pronunciation, e.g. IPA
        #[arg(long, short)]
        pronunciation: Option<String>,
    },

    /// Show word details
    Show {
        /// Word ID
        id: i64,
    },

    /// Delete a word and all progress on it
    Delete {
        /// Word ID
        id: i64,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vocab_srs=warn,vocab=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let scheduler = Scheduler::new(config.scheduler.clone())?;
    let db_path = config.database_path();
    let mut db =
        Database::open(&db_path)?.with_minimum_ease(scheduler.policy().minimum_ease);
    let learner = cli.learner.clone().unwrap_or_else(default_learner);
    let now = Utc::now();

    tracing::debug!(db = %db_path.display(), learner = %learner, "starting");

    match cli.command {
        Commands::Init => {
            db.init()?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Word(word_cmd) => match word_cmd {
            WordCommands::List => {
                let words: Vec<WordWithState> = db
                    .list_words_with_states(&learner)?
                    .into_iter()
                    .map(|(word, state)| {
                        let state = state.unwrap_or_else(|| scheduler.initial_state(now));
                        WordWithState::new(word, state)
                    })
                    .collect();

                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(&words))?);
                } else if words.is_empty() {
                    println!("No words found.");
                } else {
                    print_word_table(&words, now);
                }
            }

            WordCommands::Add {
                term,
                definition,
                example,
                pronunciation,
            } => {
                let id = db.add_word(
                    &term,
                    definition.as_deref(),
                    example.as_deref(),
                    pronunciation.as_deref(),
                )?;

                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "id": id,
                            "term": term
                        })))?
                    );
                } else {
                    println!("Added word '{}' with ID: {}", term, id);
                }
            }

            WordCommands::Show { id } => {
                if let Some(word) = db.get_word(id)? {
                    let state = db
                        .load_state(&learner, id)?
                        .unwrap_or_else(|| scheduler.initial_state(now));
                    let wws = WordWithState::new(word, state);

                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::ok(&wws))?);
                    } else {
                        let word = &wws.word;
                        println!("Word: {}", word.term);
                        println!("ID: {}", word.id);
                        if let Some(p) = &word.pronunciation {
                            println!("Pronunciation: {}", p);
                        }
                        if let Some(d) = &word.definition {
                            println!("Definition: {}", d);
                        }
                        if let Some(e) = &word.example {
                            println!("Example: {}", e);
                        }
                        println!("Added: {}", word.created_at);

                        let s = &wws.state;
                        println!();
                        println!("--- Progress ({}) ---", learner);
                        println!("Mastery: {}", wws.mastery.label());
                        println!("Streak: {} (ease {:.2})", s.repetitions, s.ease_factor);
                        println!("Interval: {} day(s)", s.interval);
                        if let Some(last) = &s.last_review {
                            println!("Last reviewed: {}", last.to_rfc3339());
                        }
                        println!("Next review: {}", describe_due(s, now));
                    }
                } else {
                    print_not_found(cli.json)?;
                }
            }

            WordCommands::Delete { id } => {
                if db.delete_word(id)? {
                    if cli.json {
                        println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                    } else {
                        println!("Word {} deleted.", id);
                    }
                } else {
                    print_not_found(cli.json)?;
                }
            }
        },

        Commands::Due { limit } => {
            let due = db.due_words(&learner, &scheduler, now, limit)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&due))?);
            } else if due.is_empty() {
                println!("Nothing due. Come back later!");
            } else {
                print_word_table(&due, now);
                println!();
                println!("Study them with: vocab study");
            }
        }

        Commands::Review { id, rating } => {
            let rating = parse_rating(&rating)?;
            db.require_word(id)?;

            let state = db
                .load_state(&learner, id)?
                .unwrap_or_else(|| scheduler.initial_state(now));
            let next = scheduler.schedule(&state, rating, now);
            db.save_review(&learner, id, rating, &next)?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&next))?);
            } else {
                println!("Rated word {} as {}.", id, rating);
                println!(
                    "Streak: {}, ease: {:.2}, interval: {} day(s)",
                    next.repetitions, next.ease_factor, next.interval
                );
                println!("Next review scheduled: {}", next.next_review.to_rfc3339());
            }
        }

        Commands::Preview { id } => {
            db.require_word(id)?;
            let state = db
                .load_state(&learner, id)?
                .unwrap_or_else(|| scheduler.initial_state(now));
            let preview = scheduler.preview(&state, now);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&preview))?);
            } else {
                println!("{:<5} {:<8} INTERVAL", "KEY", "RATING");
                println!("{}", "-".repeat(30));
                for p in preview {
                    println!("{:<5} {:<8} {} day(s)", p.rating.digit(), p.rating, p.interval);
                }
            }
        }

        Commands::History { id } => {
            db.require_word(id)?;
            let history = db.review_history(&learner, id)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&history))?);
            } else if history.is_empty() {
                println!("No reviews recorded.");
            } else {
                println!("{:<26} {:<8} {:<10} EASE", "REVIEWED", "RATING", "INTERVAL");
                println!("{}", "-".repeat(55));
                for r in history {
                    println!(
                        "{:<26} {:<8} {:<10} {:.2}",
                        r.reviewed_at.format("%Y-%m-%d %H:%M:%S UTC"),
                        r.rating,
                        format!("{}d", r.interval),
                        r.ease_factor
                    );
                }
            }
        }

        Commands::Study { limit } => {
            let limit = limit.unwrap_or(config.session.default_limit);
            let queue = db.due_words(&learner, &scheduler, now, Some(limit))?;

            let stdin = std::io::stdin();
            let summary = StudySession::new(&mut db, &scheduler, &learner, now).run(
                &queue,
                stdin.lock(),
                SessionStream::for_output(cli.json).writer(),
            )?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&summary))?);
            }
        }

        Commands::Stats => {
            let stats = db.get_stats(&learner, now)?;
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("=== Learning Statistics ({}) ===", learner);
                println!("Total words: {}", stats.total_words);
                println!("Total reviews: {}", stats.total_reviews);
                println!("Due now: {}", stats.due_now);
                println!(
                    "New / learning / reviewing / mastered: {} / {} / {} / {}",
                    stats.new, stats.learning, stats.reviewing, stats.mastered
                );
                println!("Average ease: {:.2}", stats.avg_ease);
            }
        }
    }

    Ok(())
}

/// Where the interactive session writes. With `--json`, stdout carries
/// only the summary document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionStream {
    Stdout,
    Stderr,
}

impl SessionStream {
    fn for_output(json: bool) -> Self {
        if json {
            SessionStream::Stderr
        } else {
            SessionStream::Stdout
        }
    }

    fn writer(self) -> Box<dyn std::io::Write> {
        match self {
            SessionStream::Stdout => Box::new(std::io::stdout().lock()),
            SessionStream::Stderr => Box::new(std::io::stderr().lock()),
        }
    }
}

fn print_not_found(json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!(
            "{}",
            serde_json::to_string(&JsonOutput::<()>::err("Word not found"))?
        );
    } else {
        println!("Word not found.");
    }
    Ok(())
}

fn print_word_table(words: &[WordWithState], now: DateTime<Utc>) {
    println!("{:<5} {:<30} {:<10} DUE", "ID", "TERM", "MASTERY");
    println!("{}", "-".repeat(60));
    for w in words {
        println!(
            "{:<5} {:<30} {:<10} {}",
            w.word.id,
            truncate(&w.word.term, 28),
            w.mastery.label(),
            describe_due(&w.state, now)
        );
    }
}

fn describe_due(state: &SchedulingState, now: DateTime<Utc>) -> String {
    if state.is_due(now) {
        let overdue = state.overdue_by(now).num_days();
        return if overdue >= 1 {
            format!("{}d overdue", overdue)
        } else {
            String::from("now")
        };
    }

    let until = state.next_review - now;
    if until.num_days() >= 1 {
        format!("in {}d", until.num_days())
    } else if until.num_hours() >= 1 {
        format!("in {}h", until.num_hours())
    } else {
        format!("in {}m", until.num_minutes().max(1))
    }
}

// Counts chars, not bytes: terms are often non-ASCII
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
