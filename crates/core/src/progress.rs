//! Append-only ledger of study sessions and the statistics derived from it.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::challenge::ChallengesDocument;
use crate::document::{load_document, save_document, CHALLENGES_DOC, PROGRESS_DOC};
use crate::{require_text, LearnError, LearningStore, Result};

/// Upper bound of the self-assessed mastery scale.
pub const MAX_MASTERY: f64 = 10.0;
/// How many topics [`ProgressStats::time_by_topic`] keeps.
const TOP_TOPICS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// `pr_` followed by eight hex characters.
    pub id: String,
    pub topic: String,
    pub activity: String,
    pub duration_minutes: f64,
    /// Self-assessment on a 0-10 scale.
    pub mastery_rating: f64,
    #[serde(default)]
    pub challenge_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct ProgressDocument {
    #[serde(default)]
    pub(crate) entries: Vec<ProgressEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicTime {
    pub topic: String,
    pub minutes: f64,
}

/// Aggregates over the entries inside a look-back window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressStats {
    pub days: u32,
    pub topic_filter: Option<String>,
    pub entries: usize,
    pub total_minutes: f64,
    /// Mean mastery rating; 0 when there are no entries.
    pub average_mastery: f64,
    /// Distinct UTC calendar days with at least one entry.
    pub active_days: usize,
    /// Minutes per topic, largest first, at most ten topics.
    pub time_by_topic: Vec<TopicTime>,
}

impl ProgressStats {
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

/// Case-insensitive substring match used by every topic filter.
pub(crate) fn topic_matches(topic: &str, filter: Option<&str>) -> bool {
    filter.is_none_or(|f| topic.to_lowercase().contains(&f.to_lowercase()))
}

fn validate_entry(duration_minutes: f64, mastery_rating: f64) -> Result<()> {
    if !duration_minutes.is_finite() || duration_minutes < 0.0 {
        return Err(LearnError::Validation(format!(
            "duration_minutes must be a non-negative number (got {duration_minutes})"
        )));
    }
    if !mastery_rating.is_finite() || !(0.0..=MAX_MASTERY).contains(&mastery_rating) {
        return Err(LearnError::Validation(format!(
            "mastery_rating must be between 0 and {MAX_MASTERY} (got {mastery_rating})"
        )));
    }
    Ok(())
}

impl LearningStore {
    /// Append a progress entry. When `challenge_id` names an existing
    /// challenge its `time_spent_minutes` grows by `duration_minutes`.
    pub fn record_progress(
        &self,
        topic: &str,
        activity: &str,
        duration_minutes: f64,
        mastery_rating: f64,
        challenge_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<ProgressEntry> {
        require_text("topic", topic)?;
        require_text("activity", activity)?;
        validate_entry(duration_minutes, mastery_rating)?;

        let mut doc: ProgressDocument = load_document(self.documents(), PROGRESS_DOC)?;
        let id = self.unused_id("pr_", |id| doc.entries.iter().any(|e| e.id == id))?;
        let entry = ProgressEntry {
            id,
            topic: topic.to_string(),
            activity: activity.to_string(),
            duration_minutes,
            mastery_rating,
            challenge_id: challenge_id.map(str::to_string),
            notes: notes.map(str::to_string),
            timestamp: self.now(),
        };
        doc.entries.push(entry.clone());
        save_document(self.documents(), PROGRESS_DOC, &doc)?;
        info!(id = %entry.id, topic = %entry.topic, minutes = duration_minutes, "progress recorded");

        if let Some(id) = challenge_id {
            let mut challenges: ChallengesDocument =
                load_document(self.documents(), CHALLENGES_DOC)?;
            match challenges.get_mut(id) {
                Some(challenge) => {
                    challenge.time_spent_minutes += duration_minutes;
                    save_document(self.documents(), CHALLENGES_DOC, &challenges)?;
                }
                None => warn!(challenge_id = id, "progress linked to unknown challenge"),
            }
        }

        Ok(entry)
    }

    /// Every progress entry in the order it was recorded.
    pub fn progress_entries(&self) -> Result<Vec<ProgressEntry>> {
        let doc: ProgressDocument = load_document(self.documents(), PROGRESS_DOC)?;
        Ok(doc.entries)
    }

    /// Statistics over entries newer than `days` ago, optionally restricted
    /// to topics containing `topic`.
    pub fn progress_stats(&self, topic: Option<&str>, days: u32) -> Result<ProgressStats> {
        if days == 0 {
            return Err(LearnError::Validation("days must be positive".to_string()));
        }
        let cutoff = self.now() - Duration::days(i64::from(days));
        let entries: Vec<ProgressEntry> = self
            .progress_entries()?
            .into_iter()
            .filter(|e| e.timestamp > cutoff)
            .filter(|e| topic_matches(&e.topic, topic))
            .collect();

        let total_minutes: f64 = entries.iter().map(|e| e.duration_minutes).sum();
        let average_mastery = if entries.is_empty() {
            0.0
        } else {
            entries.iter().map(|e| e.mastery_rating).sum::<f64>() / entries.len() as f64
        };
        let active_days: BTreeSet<NaiveDate> =
            entries.iter().map(|e| e.timestamp.date_naive()).collect();

        let mut per_topic: HashMap<&str, f64> = HashMap::new();
        for e in &entries {
            *per_topic.entry(e.topic.as_str()).or_default() += e.duration_minutes;
        }
        let mut time_by_topic: Vec<TopicTime> = per_topic
            .into_iter()
            .map(|(topic, minutes)| TopicTime {
                topic: topic.to_string(),
                minutes,
            })
            .collect();
        time_by_topic.sort_by(|a, b| {
            b.minutes
                .total_cmp(&a.minutes)
                .then_with(|| a.topic.cmp(&b.topic))
        });
        time_by_topic.truncate(TOP_TOPICS);

        Ok(ProgressStats {
            days,
            topic_filter: topic.map(str::to_string),
            entries: entries.len(),
            total_minutes,
            average_mastery,
            active_days: active_days.len(),
            time_by_topic,
        })
    }
}
