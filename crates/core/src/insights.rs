//! Heuristic reports over progress and challenges: what to study next and
//! where the knowledge gaps are.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::challenge::{Challenge, ChallengeStatus};
use crate::progress::{topic_matches, ProgressEntry};
use crate::{LearningStore, Result};

/// Average mastery below this marks a topic as weak.
pub const WEAK_MASTERY: f64 = 7.0;
/// A topic untouched for more than this many whole days is stale.
pub const STALE_AFTER_DAYS: i64 = 14;

/// Suggestions only look at this many of the latest entries.
const RECENT_ENTRIES: usize = 20;
const MAX_SUGGESTIONS: usize = 5;
const MAX_GAPS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMastery {
    pub topic: String,
    pub average_mastery: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestions {
    /// Recently studied topics with low average mastery, weakest first.
    pub weak_topics: Vec<TopicMastery>,
    /// Oldest pending challenges.
    pub pending_challenges: Vec<Challenge>,
    /// Pending challenges in total, before truncation.
    pub pending_total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeGap {
    pub topic: String,
    pub average_mastery: f64,
    pub days_since_activity: i64,
    pub total_minutes: f64,
}

/// Group entries by topic, keeping first-seen order.
fn group_by_topic<'a>(
    entries: impl IntoIterator<Item = &'a ProgressEntry>,
) -> Vec<(&'a str, Vec<&'a ProgressEntry>)> {
    let mut order: Vec<(&str, Vec<&ProgressEntry>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for e in entries {
        match index.get(e.topic.as_str()) {
            Some(&i) => order[i].1.push(e),
            None => {
                index.insert(e.topic.as_str(), order.len());
                order.push((e.topic.as_str(), vec![e]));
            }
        }
    }
    order
}

fn average_mastery(entries: &[&ProgressEntry]) -> f64 {
    entries.iter().map(|e| e.mastery_rating).sum::<f64>() / entries.len() as f64
}

impl LearningStore {
    /// Weak recent topics plus pending challenges, optionally limited to
    /// topics containing `area`.
    pub fn suggest_next_topic(&self, area: Option<&str>) -> Result<Suggestions> {
        let entries = self.progress_entries()?;
        let recent = &entries[entries.len().saturating_sub(RECENT_ENTRIES)..];

        let mut weak_topics: Vec<TopicMastery> =
            group_by_topic(recent.iter().filter(|e| topic_matches(&e.topic, area)))
                .into_iter()
                .map(|(topic, group)| TopicMastery {
                    topic: topic.to_string(),
                    average_mastery: average_mastery(&group),
                })
                .filter(|t| t.average_mastery < WEAK_MASTERY)
                .collect();
        weak_topics.sort_by(|a, b| a.average_mastery.total_cmp(&b.average_mastery));
        weak_topics.truncate(MAX_SUGGESTIONS);

        let mut pending: Vec<Challenge> = self
            .list_challenges(Some(ChallengeStatus::Pending), None)?
            .into_iter()
            .filter(|c| topic_matches(&c.topic, area))
            .collect();
        pending.reverse();
        let pending_total = pending.len();
        pending.truncate(MAX_SUGGESTIONS);

        Ok(Suggestions {
            weak_topics,
            pending_challenges: pending,
            pending_total,
        })
    }

    /// Topics whose average mastery is weak or whose last activity is stale,
    /// weakest first and, among equals, longest neglected first.
    pub fn analyze_knowledge_gaps(&self, focus_area: Option<&str>) -> Result<Vec<KnowledgeGap>> {
        self.knowledge_gaps_at(focus_area, self.now())
    }

    fn knowledge_gaps_at(
        &self,
        focus_area: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<KnowledgeGap>> {
        let entries = self.progress_entries()?;
        let mut gaps: Vec<KnowledgeGap> =
            group_by_topic(entries.iter().filter(|e| topic_matches(&e.topic, focus_area)))
                .into_iter()
                .filter_map(|(topic, group)| {
                    let last = group.iter().map(|e| e.timestamp).max()?;
                    let gap = KnowledgeGap {
                        topic: topic.to_string(),
                        average_mastery: average_mastery(&group),
                        days_since_activity: (now - last).num_days(),
                        total_minutes: group.iter().map(|e| e.duration_minutes).sum(),
                    };
                    let weak = gap.average_mastery < WEAK_MASTERY;
                    let stale = gap.days_since_activity > STALE_AFTER_DAYS;
                    (weak || stale).then_some(gap)
                })
                .collect();
        gaps.sort_by(|a, b| {
            a.average_mastery
                .total_cmp(&b.average_mastery)
                .then_with(|| b.days_since_activity.cmp(&a.days_since_activity))
        });
        gaps.truncate(MAX_GAPS);
        Ok(gaps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_store;
    use crate::{ChallengeType, Difficulty};
    use chrono::Duration;

    #[test]
    fn suggestions_flag_weak_recent_topics() {
        let (store, _clock) = memory_store();
        store.record_progress("Docker", "a", 30.0, 4.0, None, None).unwrap();
        store.record_progress("Docker", "b", 30.0, 6.0, None, None).unwrap();
        store.record_progress("Python", "c", 30.0, 9.0, None, None).unwrap();
        store.record_progress("Kubernetes", "d", 30.0, 3.0, None, None).unwrap();

        let s = store.suggest_next_topic(None).unwrap();
        let topics: Vec<&str> = s.weak_topics.iter().map(|t| t.topic.as_str()).collect();
        assert_eq!(topics, vec!["Kubernetes", "Docker"]);
        assert_eq!(s.weak_topics[1].average_mastery, 5.0);
    }

    #[test]
    fn suggestions_only_consider_recent_entries() {
        let (store, _clock) = memory_store();
        store.record_progress("Ancient", "x", 10.0, 1.0, None, None).unwrap();
        for i in 0..RECENT_ENTRIES {
            store
                .record_progress("Rust", &format!("session {i}"), 10.0, 9.0, None, None)
                .unwrap();
        }
        let s = store.suggest_next_topic(None).unwrap();
        assert!(s.weak_topics.is_empty());
    }

    #[test]
    fn suggestions_list_oldest_pending_challenges_and_filter_by_area() {
        let (store, clock) = memory_store();
        let first = store
            .create_challenge("Docker Compose", Difficulty::Beginner, ChallengeType::Practical, None)
            .unwrap();
        clock.advance(Duration::hours(1));
        store
            .create_challenge("Python Async", Difficulty::Beginner, ChallengeType::Knowledge, None)
            .unwrap();
        clock.advance(Duration::hours(1));
        let started = store
            .create_challenge("Docker Swarm", Difficulty::Advanced, ChallengeType::Analysis, None)
            .unwrap();
        store
            .update_challenge_status(&started.id, ChallengeStatus::InProgress, None)
            .unwrap();

        let all = store.suggest_next_topic(None).unwrap();
        assert_eq!(all.pending_total, 2);
        assert_eq!(all.pending_challenges[0].id, first.id);

        let docker = store.suggest_next_topic(Some("docker")).unwrap();
        assert_eq!(docker.pending_total, 1);
        assert_eq!(docker.pending_challenges[0].topic, "Docker Compose");
    }

    #[test]
    fn gaps_include_weak_and_stale_topics() {
        let (store, clock) = memory_store();
        store.record_progress("Stale Strong", "a", 20.0, 9.0, None, None).unwrap();
        clock.advance(Duration::days(20));
        store.record_progress("Fresh Weak", "b", 40.0, 5.0, None, None).unwrap();
        store.record_progress("Fresh Weak", "c", 20.0, 6.0, None, None).unwrap();
        store.record_progress("Fresh Strong", "d", 10.0, 8.0, None, None).unwrap();

        let gaps = store.analyze_knowledge_gaps(None).unwrap();
        let topics: Vec<&str> = gaps.iter().map(|g| g.topic.as_str()).collect();
        assert_eq!(topics, vec!["Fresh Weak", "Stale Strong"]);
        assert_eq!(gaps[0].total_minutes, 60.0);
        assert_eq!(gaps[0].days_since_activity, 0);
        assert_eq!(gaps[1].days_since_activity, 20);
    }

    #[test]
    fn gap_ties_put_longest_neglected_first() {
        let (store, clock) = memory_store();
        store.record_progress("Old", "a", 10.0, 5.0, None, None).unwrap();
        clock.advance(Duration::days(3));
        store.record_progress("New", "b", 10.0, 5.0, None, None).unwrap();

        let gaps = store.analyze_knowledge_gaps(Some("")).unwrap();
        assert_eq!(gaps[0].topic, "Old");
        assert_eq!(gaps[1].topic, "New");
    }

    #[test]
    fn gaps_respect_focus_area_and_empty_ledger() {
        let (store, _clock) = memory_store();
        assert!(store.analyze_knowledge_gaps(None).unwrap().is_empty());

        store.record_progress("Docker", "a", 10.0, 2.0, None, None).unwrap();
        store.record_progress("Python", "b", 10.0, 2.0, None, None).unwrap();
        let gaps = store.analyze_knowledge_gaps(Some("PYTH")).unwrap();
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].topic, "Python");
    }
}
