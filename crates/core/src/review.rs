//! Spaced-repetition reviews with a simplified SM-2 recurrence.
//!
//! A [`Review`] is scheduled once and then completed any number of times.
//! Each completion grades recall with a [`Performance`] tier, which maps to
//! an SM-2 quality number:
//!
//! | tier       | quality |
//! |------------|---------|
//! | `weak`     | 0       |
//! | `moderate` | 3       |
//! | `strong`   | 4       |
//! | `perfect`  | 5       |
//!
//! Quality 3 and above counts as a successful repetition. The first two
//! successes in a chain get fixed intervals of 1 and 6 days; after that the
//! previous interval is multiplied by the ease factor. A weak completion
//! resets the chain to an interval of 1 day and leaves the ease factor alone.
//!
//! Intervals are real-valued days. `next_review_at` is always the completion
//! time (or the creation time, before the first completion) plus
//! `interval_days`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::{load_document, save_document, REVIEWS_DOC};
use crate::{require_text, LearnError, LearningStore, Result};

/// Ease factor given to every new review.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
/// Lower bound on the ease factor.
pub const MIN_EASE_FACTOR: f64 = 1.3;
/// Upper bound on any interval: 100 years.
pub const MAX_INTERVAL_DAYS: f64 = 36_500.0;

const SUCCESS_QUALITY: u8 = 3;
const MICROS_PER_DAY: f64 = 86_400_000_000.0;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How well the material was recalled during a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Performance {
    Weak,
    Moderate,
    Strong,
    Perfect,
}

impl Performance {
    pub const ALL: [Performance; 4] = [
        Performance::Weak,
        Performance::Moderate,
        Performance::Strong,
        Performance::Perfect,
    ];

    /// SM-2 quality number for this tier.
    pub fn quality(self) -> u8 {
        match self {
            Performance::Weak => 0,
            Performance::Moderate => 3,
            Performance::Strong => 4,
            Performance::Perfect => 5,
        }
    }

    pub fn is_success(self) -> bool {
        self.quality() >= SUCCESS_QUALITY
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Performance::Weak => "weak",
            Performance::Moderate => "moderate",
            Performance::Strong => "strong",
            Performance::Perfect => "perfect",
        }
    }
}

impl fmt::Display for Performance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Performance {
    type Err = LearnError;

    fn from_str(s: &str) -> Result<Self> {
        Performance::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| {
                LearnError::Validation(format!(
                    "performance must be one of weak, moderate, strong, perfect (got {s:?})"
                ))
            })
    }
}

/// One annotated completion in a review's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewLogEntry {
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub performance: Performance,
    pub notes: String,
}

/// A scheduled spaced-repetition item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Opaque id, `rv_` followed by eight hex characters.
    pub id: String,
    pub topic: String,
    /// Pointer to the material being reviewed (e.g. a note path). Never
    /// interpreted.
    #[serde(rename = "note_path")]
    pub source_reference: String,
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    /// When this item next becomes due.
    #[serde(rename = "next_review", deserialize_with = "crate::clock::deserialize_timestamp")]
    pub next_review_at: DateTime<Utc>,
    /// Current spacing in days. Always positive.
    pub interval_days: f64,
    /// Consecutive successful completions since the last weak one.
    pub repetitions: u32,
    /// Interval multiplier; never below [`MIN_EASE_FACTOR`].
    pub ease_factor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_performance: Option<Performance>,
    /// Completions that carried notes, oldest first. Append-only.
    #[serde(
        rename = "review_notes",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub review_log: Vec<ReviewLogEntry>,
}

impl Review {
    /// Is this review due at `now` (scheduled time reached or passed)?
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }

    /// Whole days `now` is past the scheduled time; 0 when due today or
    /// not yet due.
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        (now - self.next_review_at).num_days().max(0)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReviewsDocument {
    #[serde(default)]
    reviews: Vec<Review>,
}

// ---------------------------------------------------------------------------
// Recurrence
// ---------------------------------------------------------------------------

/// Scheduling state after one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleUpdate {
    pub interval_days: f64,
    pub repetitions: u32,
    pub ease_factor: f64,
}

/// Apply one SM-2 step to `(repetitions, interval_days, ease_factor)`.
///
/// On success the multiplicative branch uses the *previous* interval and
/// ease factor; the ease factor is then adjusted by
/// `0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)` and floored at
/// [`MIN_EASE_FACTOR`]. Intervals stop growing at [`MAX_INTERVAL_DAYS`].
/// On failure only the chain resets.
pub fn next_schedule(
    repetitions: u32,
    interval_days: f64,
    ease_factor: f64,
    performance: Performance,
) -> ScheduleUpdate {
    if !performance.is_success() {
        return ScheduleUpdate {
            interval_days: 1.0,
            repetitions: 0,
            ease_factor,
        };
    }

    let interval_days = match repetitions {
        0 => 1.0,
        1 => 6.0,
        _ => (interval_days * ease_factor).min(MAX_INTERVAL_DAYS),
    };
    let miss = f64::from(5 - performance.quality());
    let ease_factor = (ease_factor + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE_FACTOR);

    ScheduleUpdate {
        interval_days,
        repetitions: repetitions.saturating_add(1),
        ease_factor,
    }
}

fn validate_interval(days: f64) -> Result<()> {
    if !days.is_finite() || days <= 0.0 {
        return Err(LearnError::Validation(format!(
            "interval_days must be a positive finite number (got {days})"
        )));
    }
    if days > MAX_INTERVAL_DAYS {
        return Err(LearnError::Validation(format!(
            "interval_days must be at most {MAX_INTERVAL_DAYS} (got {days})"
        )));
    }
    Ok(())
}

/// `at + days`, keeping sub-day precision down to the microsecond.
fn add_days(at: DateTime<Utc>, days: f64) -> Result<DateTime<Utc>> {
    validate_interval(days)?;
    // Capped intervals fit comfortably in i64 microseconds.
    let micros = (days * MICROS_PER_DAY).round() as i64;
    at.checked_add_signed(Duration::microseconds(micros))
        .ok_or_else(|| {
            LearnError::Validation(format!(
                "an interval of {days} days puts the next review out of range"
            ))
        })
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl LearningStore {
    /// Create and persist a new review, first due `initial_interval_days`
    /// from now.
    pub fn schedule_review(
        &self,
        topic: &str,
        source_reference: &str,
        initial_interval_days: f64,
    ) -> Result<Review> {
        require_text("topic", topic)?;
        let now = self.now();
        let next_review_at = add_days(now, initial_interval_days)?;

        let mut doc: ReviewsDocument = load_document(self.documents(), REVIEWS_DOC)?;
        let id = self.unused_id("rv_", |id| doc.reviews.iter().any(|r| r.id == id))?;
        let review = Review {
            id,
            topic: topic.to_string(),
            source_reference: source_reference.to_string(),
            created_at: now,
            next_review_at,
            interval_days: initial_interval_days,
            repetitions: 0,
            ease_factor: DEFAULT_EASE_FACTOR,
            last_performance: None,
            review_log: Vec::new(),
        };
        doc.reviews.push(review.clone());
        save_document(self.documents(), REVIEWS_DOC, &doc)?;

        info!(id = %review.id, topic = %review.topic, next = %review.next_review_at, "review scheduled");
        Ok(review)
    }

    /// Every review with `next_review_at <= now`, most overdue first.
    pub fn due_reviews(&self, now: DateTime<Utc>) -> Result<Vec<Review>> {
        let doc: ReviewsDocument = load_document(self.documents(), REVIEWS_DOC)?;
        let mut due: Vec<Review> = doc.reviews.into_iter().filter(|r| r.is_due(now)).collect();
        due.sort_by(|a, b| {
            a.next_review_at
                .cmp(&b.next_review_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(due)
    }

    /// All reviews in stored order.
    pub fn reviews(&self) -> Result<Vec<Review>> {
        let doc: ReviewsDocument = load_document(self.documents(), REVIEWS_DOC)?;
        Ok(doc.reviews)
    }

    /// Look up one review by id.
    pub fn review(&self, review_id: &str) -> Result<Review> {
        self.reviews()?
            .into_iter()
            .find(|r| r.id == review_id)
            .ok_or_else(|| LearnError::NotFound(format!("review {review_id}")))
    }

    /// Record a completion and reschedule the review.
    ///
    /// Non-empty `notes` are appended to the review log. Returns the updated
    /// review. An unknown id fails with [`LearnError::NotFound`] and nothing
    /// is written.
    pub fn complete_review(
        &self,
        review_id: &str,
        performance: Performance,
        notes: Option<&str>,
    ) -> Result<Review> {
        require_text("review_id", review_id)?;
        let mut doc: ReviewsDocument = load_document(self.documents(), REVIEWS_DOC)?;
        let review = doc
            .reviews
            .iter_mut()
            .find(|r| r.id == review_id)
            .ok_or_else(|| LearnError::NotFound(format!("review {review_id}")))?;

        let now = self.now();
        let update = next_schedule(
            review.repetitions,
            review.interval_days,
            review.ease_factor,
            performance,
        );
        let next_review_at = add_days(now, update.interval_days)?;

        review.interval_days = update.interval_days;
        review.repetitions = update.repetitions;
        review.ease_factor = update.ease_factor;
        review.next_review_at = next_review_at;
        review.last_performance = Some(performance);
        if let Some(text) = notes.filter(|n| !n.is_empty()) {
            review.review_log.push(ReviewLogEntry {
                timestamp: now,
                performance,
                notes: text.to_string(),
            });
        }
        let updated = review.clone();

        save_document(self.documents(), REVIEWS_DOC, &doc)?;

        info!(
            id = %updated.id,
            performance = %performance,
            interval_days = updated.interval_days,
            repetitions = updated.repetitions,
            "review completed"
        );
        Ok(updated)
    }
}
