//! Learning challenges: generated study tasks with a status lifecycle.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::{load_document, save_document, CHALLENGES_DOC};
use crate::{require_text, LearnError, LearningStore, Result};

/// Declares a closed, snake_case-named enum with `as_str`, `Display` and a
/// validating `FromStr`.
macro_rules! tier_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = LearnError;

            fn from_str(s: &str) -> Result<Self> {
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        LearnError::Validation(format!(
                            "{} must be one of {} (got {s:?})",
                            $field,
                            allowed.join(", ")
                        ))
                    })
            }
        }
    };
}

tier_enum!(
    Difficulty, "difficulty" {
        Beginner => "beginner",
        Intermediate => "intermediate",
        Advanced => "advanced",
        Expert => "expert",
    }
);

tier_enum!(
    /// What kind of work the challenge asks for.
    ChallengeType, "challenge_type" {
        Knowledge => "knowledge",
        Practical => "practical",
        Teaching => "teaching",
        Analysis => "analysis",
        Creative => "creative",
    }
);

tier_enum!(
    ChallengeStatus, "status" {
        Pending => "pending",
        InProgress => "in_progress",
        Completed => "completed",
        Archived => "archived",
    }
);

impl ChallengeStatus {
    /// Order in which status groups are presented: active work first.
    pub const DISPLAY_ORDER: [ChallengeStatus; 4] = [
        ChallengeStatus::InProgress,
        ChallengeStatus::Pending,
        ChallengeStatus::Completed,
        ChallengeStatus::Archived,
    ];
}

/// Timestamped note attached on a status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeNote {
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    /// `ch_` followed by eight hex characters.
    pub id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    #[serde(rename = "type")]
    pub challenge_type: ChallengeType,
    pub description: String,
    pub status: ChallengeStatus,
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "crate::clock::deserialize_timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Minutes logged against this challenge through progress entries.
    #[serde(default)]
    pub time_spent_minutes: f64,
    #[serde(default)]
    pub notes: Vec<ChallengeNote>,
}

pub(crate) type ChallengesDocument = BTreeMap<String, Challenge>;

/// Default task text for a challenge type and difficulty.
pub fn challenge_template(challenge_type: ChallengeType, difficulty: Difficulty, topic: &str) -> String {
    use ChallengeType::*;
    use Difficulty::*;

    match (challenge_type, difficulty) {
        (Knowledge, Beginner) => format!("Research and summarize the basics of {topic}. Create a note explaining key concepts in simple terms."),
        (Knowledge, Intermediate) => format!("Deep dive into {topic}. Compare different approaches and document your findings with examples."),
        (Knowledge, Advanced) => format!("Critically analyze {topic}. Evaluate trade-offs, edge cases, and best practices."),
        (Knowledge, Expert) => format!("Become an expert on {topic}. Write comprehensive documentation that could teach others."),
        (Practical, Beginner) => format!("Build a simple project demonstrating basic {topic} concepts."),
        (Practical, Intermediate) => format!("Create a working application using {topic}. Include error handling and documentation."),
        (Practical, Advanced) => format!("Develop a production-ready solution using {topic}. Optimize for performance and maintainability."),
        (Practical, Expert) => format!("Design and implement a complex system showcasing advanced {topic} patterns."),
        (Teaching, Beginner) => format!("Explain {topic} to a beginner. Create analogies and simple examples."),
        (Teaching, Intermediate) => format!("Write a tutorial on {topic} that helps someone build something real."),
        (Teaching, Advanced) => format!("Create a comprehensive guide on {topic} covering common pitfalls and advanced techniques."),
        (Teaching, Expert) => format!("Develop a complete learning curriculum for {topic} with progression path."),
        (Analysis, Beginner) => format!("Compare 2-3 different approaches to {topic}. List pros and cons."),
        (Analysis, Intermediate) => format!("Analyze when and why to use {topic}. Provide concrete use cases."),
        (Analysis, Advanced) => format!("Evaluate {topic} in production scenarios. Consider scalability, security, and cost."),
        (Analysis, Expert) => format!("Conduct deep technical analysis of {topic}. Benchmark and document findings."),
        (Creative, Beginner) => format!("Design a simple solution using {topic}. Sketch or diagram your idea."),
        (Creative, Intermediate) => format!("Create something innovative combining {topic} with other concepts."),
        (Creative, Advanced) => format!("Architect a novel system leveraging {topic}. Document design decisions."),
        (Creative, Expert) => format!("Pioneer new applications of {topic}. Push boundaries and document discoveries."),
    }
}

impl LearningStore {
    /// Create a pending challenge. Without a `description` the text comes
    /// from [`challenge_template`].
    pub fn create_challenge(
        &self,
        topic: &str,
        difficulty: Difficulty,
        challenge_type: ChallengeType,
        description: Option<&str>,
    ) -> Result<Challenge> {
        require_text("topic", topic)?;
        let now = self.now();
        let description = match description.filter(|d| !d.trim().is_empty()) {
            Some(d) => d.to_string(),
            None => challenge_template(challenge_type, difficulty, topic),
        };

        let mut doc: ChallengesDocument = load_document(self.documents(), CHALLENGES_DOC)?;
        let id = self.unused_id("ch_", |id| doc.contains_key(id))?;
        let challenge = Challenge {
            id,
            topic: topic.to_string(),
            difficulty,
            challenge_type,
            description,
            status: ChallengeStatus::Pending,
            created_at: now,
            updated_at: now,
            time_spent_minutes: 0.0,
            notes: Vec::new(),
        };
        doc.insert(challenge.id.clone(), challenge.clone());
        save_document(self.documents(), CHALLENGES_DOC, &doc)?;

        info!(id = %challenge.id, topic = %challenge.topic, "challenge created");
        Ok(challenge)
    }

    /// Challenges matching every given filter, newest first.
    pub fn list_challenges(
        &self,
        status: Option<ChallengeStatus>,
        difficulty: Option<Difficulty>,
    ) -> Result<Vec<Challenge>> {
        let doc: ChallengesDocument = load_document(self.documents(), CHALLENGES_DOC)?;
        let mut challenges: Vec<Challenge> = doc
            .into_values()
            .filter(|c| status.is_none_or(|s| c.status == s))
            .filter(|c| difficulty.is_none_or(|d| c.difficulty == d))
            .collect();
        challenges.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(challenges)
    }

    pub fn challenge(&self, challenge_id: &str) -> Result<Challenge> {
        let mut doc: ChallengesDocument = load_document(self.documents(), CHALLENGES_DOC)?;
        doc.remove(challenge_id)
            .ok_or_else(|| LearnError::NotFound(format!("challenge {challenge_id}")))
    }

    /// Move a challenge to `status`, appending `notes` if non-empty.
    pub fn update_challenge_status(
        &self,
        challenge_id: &str,
        status: ChallengeStatus,
        notes: Option<&str>,
    ) -> Result<Challenge> {
        let mut doc: ChallengesDocument = load_document(self.documents(), CHALLENGES_DOC)?;
        let challenge = doc
            .get_mut(challenge_id)
            .ok_or_else(|| LearnError::NotFound(format!("challenge {challenge_id}")))?;

        let now = self.now();
        challenge.status = status;
        challenge.updated_at = now;
        if let Some(text) = notes.filter(|n| !n.is_empty()) {
            challenge.notes.push(ChallengeNote {
                timestamp: now,
                text: text.to_string(),
            });
        }
        let updated = challenge.clone();
        save_document(self.documents(), CHALLENGES_DOC, &doc)?;

        info!(id = %updated.id, status = %updated.status, "challenge status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_store;
    use crate::Clock;
    use chrono::Duration;

    #[test]
    fn create_uses_template_when_no_description() {
        let (store, _clock) = memory_store();
        let c = store
            .create_challenge("Docker Networking", Difficulty::Intermediate, ChallengeType::Practical, None)
            .unwrap();

        assert!(c.id.starts_with("ch_"));
        assert_eq!(c.status, ChallengeStatus::Pending);
        assert_eq!(
            c.description,
            "Create a working application using Docker Networking. Include error handling and documentation."
        );
        assert_eq!(c.time_spent_minutes, 0.0);
        assert_eq!(c.created_at, c.updated_at);
    }

    #[test]
    fn create_keeps_custom_description() {
        let (store, _clock) = memory_store();
        let c = store
            .create_challenge("Rust", Difficulty::Expert, ChallengeType::Creative, Some("Write a borrow checker"))
            .unwrap();
        assert_eq!(c.description, "Write a borrow checker");
        assert_eq!(store.challenge(&c.id).unwrap(), c);
    }

    #[test]
    fn every_template_mentions_topic() {
        for &t in ChallengeType::ALL {
            for &d in Difficulty::ALL {
                assert!(challenge_template(t, d, "Kafka").contains("Kafka"), "{t}/{d}");
            }
        }
    }

    #[test]
    fn create_rejects_empty_topic() {
        let (store, _clock) = memory_store();
        let err = store
            .create_challenge("", Difficulty::Beginner, ChallengeType::Knowledge, None)
            .expect_err("empty topic");
        assert!(matches!(err, LearnError::Validation(_)));
    }

    #[test]
    fn list_filters_and_sorts_newest_first() {
        let (store, clock) = memory_store();
        let a = store
            .create_challenge("A", Difficulty::Beginner, ChallengeType::Knowledge, None)
            .unwrap();
        clock.advance(Duration::hours(1));
        let b = store
            .create_challenge("B", Difficulty::Advanced, ChallengeType::Analysis, None)
            .unwrap();
        clock.advance(Duration::hours(1));
        let c = store
            .create_challenge("C", Difficulty::Beginner, ChallengeType::Teaching, None)
            .unwrap();
        store
            .update_challenge_status(&c.id, ChallengeStatus::InProgress, None)
            .unwrap();

        let all = store.list_challenges(None, None).unwrap();
        let ids: Vec<&str> = all.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec![c.id.as_str(), b.id.as_str(), a.id.as_str()]);

        let beginner = store.list_challenges(None, Some(Difficulty::Beginner)).unwrap();
        assert_eq!(beginner.len(), 2);

        let pending_beginner = store
            .list_challenges(Some(ChallengeStatus::Pending), Some(Difficulty::Beginner))
            .unwrap();
        assert_eq!(pending_beginner.len(), 1);
        assert_eq!(pending_beginner[0].id, a.id);

        assert!(store
            .list_challenges(Some(ChallengeStatus::Archived), None)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn update_status_appends_notes_and_touches_timestamp() {
        let (store, clock) = memory_store();
        let c = store
            .create_challenge("Rust", Difficulty::Beginner, ChallengeType::Knowledge, None)
            .unwrap();
        clock.advance(Duration::minutes(30));

        let updated = store
            .update_challenge_status(&c.id, ChallengeStatus::Completed, Some("Finished the notes"))
            .unwrap();
        assert_eq!(updated.status, ChallengeStatus::Completed);
        assert_eq!(updated.updated_at, clock.now());
        assert_eq!(updated.notes.len(), 1);
        assert_eq!(updated.notes[0].text, "Finished the notes");

        let again = store
            .update_challenge_status(&c.id, ChallengeStatus::Archived, None)
            .unwrap();
        assert_eq!(again.notes.len(), 1);
    }

    #[test]
    fn missing_challenge_is_not_found() {
        let (store, _clock) = memory_store();
        assert!(matches!(store.challenge("ch_missing"), Err(LearnError::NotFound(_))));
        let err = store
            .update_challenge_status("ch_missing", ChallengeStatus::Completed, None)
            .expect_err("missing challenge");
        assert_eq!(err.to_string(), "challenge ch_missing not found");
    }

    #[test]
    fn tiers_parse_snake_case_names() {
        assert_eq!("in_progress".parse::<ChallengeStatus>().unwrap(), ChallengeStatus::InProgress);
        assert_eq!("expert".parse::<Difficulty>().unwrap(), Difficulty::Expert);
        let err = "hard".parse::<Difficulty>().expect_err("unknown difficulty");
        assert!(err.to_string().contains("beginner, intermediate, advanced, expert"));
    }

    #[test]
    fn challenge_type_is_stored_under_type_key() {
        let (store, _clock) = memory_store();
        let c = store
            .create_challenge("Rust", Difficulty::Beginner, ChallengeType::Analysis, None)
            .unwrap();
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "analysis");
        assert_eq!(json["status"], "pending");
    }

    #[test]
    fn colliding_ids_never_overwrite_challenges() {
        use crate::test_support::{store_with_ids, ScriptedIds};

        let store = store_with_ids(ScriptedIds::new(&["deadbeef", "deadbeef", "cafef00d"]));
        let first = store
            .create_challenge("First", Difficulty::Beginner, ChallengeType::Knowledge, None)
            .unwrap();
        let second = store
            .create_challenge("Second", Difficulty::Beginner, ChallengeType::Knowledge, None)
            .unwrap();

        assert_eq!(first.id, "ch_deadbeef");
        assert_eq!(second.id, "ch_cafef00d");
        assert_eq!(store.challenge("ch_deadbeef").unwrap().topic, "First");
        assert_eq!(store.list_challenges(None, None).unwrap().len(), 2);
    }
}
