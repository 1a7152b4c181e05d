//! learnkit: a file-backed personal learning tracker.
//!
//! Three kinds of record are kept, each in its own JSON document:
//!
//! - [`Challenge`]s: study tasks generated from a topic, a difficulty and a
//!   challenge type, tracked through a small status lifecycle.
//! - [`ProgressEntry`]s: an append-only ledger of study sessions with a
//!   self-assessed mastery rating.
//! - [`Review`]s: spaced-repetition items scheduled with a simplified SM-2
//!   recurrence.
//!
//! Every operation reads the whole document, mutates it in memory and writes
//! it back wholesale. There is no locking: concurrent writers lose updates
//! (last writer wins), so callers must serialise access themselves.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use learnkit::{LearningStore, Performance};
//!
//! let store = LearningStore::open("./data").unwrap();
//!
//! let review = store.schedule_review("Docker Basics", "notes/docker.md", 1.0).unwrap();
//!
//! // Tomorrow:
//! let due = store.due_reviews(store.now()).unwrap();
//! for r in &due {
//!     store.complete_review(&r.id, Performance::Strong, None).unwrap();
//! }
//! # let _ = review;
//! ```

mod challenge;
mod clock;
mod document;
mod insights;
mod progress;
mod review;

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::debug;

pub use challenge::{
    challenge_template, Challenge, ChallengeNote, ChallengeStatus, ChallengeType, Difficulty,
};
pub use clock::{
    parse_timestamp, Clock, IdGenerator, ManualClock, RandomIds, SequentialIds, SystemClock,
};
pub use document::{
    load_document, save_document, DocumentStore, JsonFileStore, MemoryStore, CHALLENGES_DOC,
    PROGRESS_DOC, REVIEWS_DOC,
};
pub use insights::{KnowledgeGap, Suggestions, TopicMastery, STALE_AFTER_DAYS, WEAK_MASTERY};
pub use progress::{ProgressEntry, ProgressStats, TopicTime, MAX_MASTERY};
pub use review::{
    next_schedule, Performance, Review, ReviewLogEntry, ScheduleUpdate, DEFAULT_EASE_FACTOR,
    MAX_INTERVAL_DAYS, MIN_EASE_FACTOR,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LearnError {
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for LearnError {
    fn from(e: std::io::Error) -> Self {
        LearnError::Storage(e.to_string())
    }
}

impl From<tempfile::PersistError> for LearnError {
    fn from(e: tempfile::PersistError) -> Self {
        LearnError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LearnError>;

/// Reject an empty or whitespace-only required text field.
pub(crate) fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(LearnError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Learning store
// ---------------------------------------------------------------------------

const MAX_ID_ATTEMPTS: usize = 16;

/// Entry point tying a [`DocumentStore`], a [`Clock`] and an
/// [`IdGenerator`] together.
///
/// The operations live in per-feature modules (`review`, `challenge`,
/// `progress`, `insights`) as `impl LearningStore` blocks.
pub struct LearningStore {
    store: Box<dyn DocumentStore>,
    clock: Box<dyn Clock>,
    ids: Box<dyn IdGenerator>,
}

impl LearningStore {
    /// Open a file-backed store rooted at `dir`, creating the directory if
    /// it does not exist.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let store = JsonFileStore::open(dir)?;
        Ok(Self::with_parts(
            Box::new(store),
            Box::new(SystemClock),
            Box::new(RandomIds),
        ))
    }

    /// Create a store that keeps its documents in memory only.
    pub fn in_memory() -> Self {
        Self::with_parts(
            Box::new(MemoryStore::default()),
            Box::new(SystemClock),
            Box::new(RandomIds),
        )
    }

    /// Assemble a store from explicit collaborators.
    pub fn with_parts(
        store: Box<dyn DocumentStore>,
        clock: Box<dyn Clock>,
        ids: Box<dyn IdGenerator>,
    ) -> Self {
        Self { store, clock, ids }
    }

    /// Current time according to the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn documents(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Draw ids until one is not `taken` by the loaded collection.
    pub(crate) fn unused_id(&self, prefix: &str, taken: impl Fn(&str) -> bool) -> Result<String> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let id = self.ids.next_id(prefix);
            if !taken(&id) {
                return Ok(id);
            }
            debug!(%id, "id already in use, drawing another");
        }
        Err(LearnError::Storage(format!(
            "no unused {prefix} id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }
}
