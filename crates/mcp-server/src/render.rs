//! Markdown text for tool results.

use std::fmt::Write;

use chrono::{DateTime, Utc};
use learnkit::{
    Challenge, ChallengeStatus, Difficulty, KnowledgeGap, ProgressEntry, ProgressStats, Review,
    Suggestions,
};

/// `"in_progress"` -> `"In Progress"`.
fn title_case(s: &str) -> String {
    s.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn day(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

pub fn challenge_created(c: &Challenge) -> String {
    format!(
        "Challenge Created!\n\n\
         **ID**: {id}\n\
         **Topic**: {topic}\n\
         **Difficulty**: {difficulty}\n\
         **Type**: {kind}\n\n\
         **Challenge**:\n{description}\n\n\
         **Status**: Pending\n\n\
         Use `update_challenge_status` to mark as in_progress when you start!\n\
         Use `record_progress` to track your work on this challenge.\n",
        id = c.id,
        topic = c.topic,
        difficulty = title_case(c.difficulty.as_str()),
        kind = title_case(c.challenge_type.as_str()),
        description = c.description,
    )
}

pub fn challenge_list(
    challenges: &[Challenge],
    status: Option<ChallengeStatus>,
    difficulty: Option<Difficulty>,
) -> String {
    if challenges.is_empty() {
        if status.is_none() && difficulty.is_none() {
            return "No challenges found. Create one with `create_challenge`!".to_string();
        }
        return format!(
            "No challenges found matching filters (status={}, difficulty={})",
            status.map_or("any", ChallengeStatus::as_str),
            difficulty.map_or("any", Difficulty::as_str),
        );
    }

    let mut out = String::from("# Your Learning Challenges\n\n");
    for group in ChallengeStatus::DISPLAY_ORDER {
        let items: Vec<&Challenge> = challenges.iter().filter(|c| c.status == group).collect();
        if items.is_empty() {
            continue;
        }
        let _ = writeln!(out, "\n## {} ({})\n", title_case(group.as_str()), items.len());
        for c in items {
            let _ = writeln!(
                out,
                "- **{}** ({}, {})",
                c.topic, c.difficulty, c.challenge_type
            );
            let _ = writeln!(out, "   ID: `{}` | Created: {}", c.id, day(c.created_at));
            if c.time_spent_minutes > 0.0 {
                let _ = writeln!(out, "   Time spent: {} minutes", c.time_spent_minutes);
            }
            out.push('\n');
        }
    }
    out
}

pub fn challenge_detail(c: &Challenge) -> String {
    let mut out = format!(
        "# Challenge: {topic}\n\n\
         **ID**: {id}\n\
         **Difficulty**: {difficulty}\n\
         **Type**: {kind}\n\
         **Status**: {status}\n\
         **Created**: {created}\n\
         **Updated**: {updated}\n\
         **Time Spent**: {minutes} minutes\n\n\
         ## Description\n{description}\n\n\
         ## Notes\n",
        topic = c.topic,
        id = c.id,
        difficulty = title_case(c.difficulty.as_str()),
        kind = title_case(c.challenge_type.as_str()),
        status = title_case(c.status.as_str()),
        created = c.created_at.to_rfc3339(),
        updated = c.updated_at.to_rfc3339(),
        minutes = c.time_spent_minutes,
        description = c.description,
    );
    if c.notes.is_empty() {
        out.push_str("\nNo notes yet.");
    }
    for note in &c.notes {
        let _ = write!(out, "\n- {}: {}", day(note.timestamp), note.text);
    }
    out
}

pub fn status_updated(c: &Challenge) -> String {
    format!("Challenge {} status updated to: {}", c.id, c.status)
}

pub fn progress_recorded(e: &ProgressEntry) -> String {
    let mut out = format!(
        "Progress Recorded!\n\n\
         **Topic**: {}\n\
         **Activity**: {}\n\
         **Duration**: {} minutes\n\
         **Mastery Rating**: {}/10\n",
        e.topic, e.activity, e.duration_minutes, e.mastery_rating
    );
    if let Some(id) = &e.challenge_id {
        let _ = writeln!(out, "**Linked Challenge**: {id}");
    }
    out
}

pub fn progress_stats(s: &ProgressStats) -> String {
    if s.is_empty() {
        let mut out = format!("No progress data found for the last {} days", s.days);
        if let Some(topic) = &s.topic_filter {
            let _ = write!(out, " for topic '{topic}'");
        }
        return out;
    }

    let mut out = format!(
        "Learning Statistics (Last {days} days)\n\n\
         **Total Entries**: {entries}\n\
         **Total Time**: {minutes:.0} minutes ({hours:.1} hours)\n\
         **Average Mastery**: {mastery:.1}/10\n\
         **Active Days**: {active}\n\n\
         **Time by Topic**:\n",
        days = s.days,
        entries = s.entries,
        minutes = s.total_minutes,
        hours = s.total_minutes / 60.0,
        mastery = s.average_mastery,
        active = s.active_days,
    );
    for t in &s.time_by_topic {
        let _ = writeln!(
            out,
            "- {}: {:.0} minutes ({:.1} hours)",
            t.topic,
            t.minutes,
            t.minutes / 60.0
        );
    }
    out
}

pub fn review_scheduled(r: &Review) -> String {
    format!(
        "Review scheduled for {} on {} (id `{}`)",
        r.topic,
        day(r.next_review_at),
        r.id
    )
}

pub fn due_reviews(due: &[Review], now: DateTime<Utc>) -> String {
    if due.is_empty() {
        return "No reviews due! Great job staying on top of your learning.".to_string();
    }
    let mut out = format!("{} Review(s) Due\n\n", due.len());
    for r in due {
        let overdue = r.days_overdue(now);
        let when = if overdue > 0 {
            format!("({overdue} days overdue)")
        } else {
            "(due today)".to_string()
        };
        let _ = writeln!(out, "**{}** {when}", r.topic);
        let _ = writeln!(out, "   ID: `{}`", r.id);
        let _ = writeln!(out, "   Note: {}", r.source_reference);
        let _ = writeln!(out, "   Repetitions: {}\n", r.repetitions);
    }
    out
}

pub fn review_completed(r: &Review) -> String {
    format!(
        "Review completed! Next review: {} ({:.1} days)",
        day(r.next_review_at),
        r.interval_days
    )
}

pub fn suggestions(s: &Suggestions) -> String {
    let mut out = String::from("Learning Suggestions\n\n");
    if !s.weak_topics.is_empty() {
        out.push_str("**Topics needing review** (low mastery scores):\n");
        for t in &s.weak_topics {
            let _ = writeln!(out, "- {} (avg rating: {:.1}/10)", t.topic, t.average_mastery);
        }
        out.push('\n');
    }
    if !s.pending_challenges.is_empty() {
        let _ = writeln!(out, "**Pending challenges** ({}):", s.pending_total);
        for c in &s.pending_challenges {
            let _ = writeln!(out, "- {} ({}, {})", c.topic, c.difficulty, c.challenge_type);
        }
        out.push('\n');
    }
    out.push_str("**General recommendations**:\n");
    out.push_str("- Review topics you haven't practiced in a while\n");
    out.push_str("- Start a pending challenge to build momentum\n");
    out.push_str("- Create a new challenge in an area you want to grow\n");
    out
}

pub fn knowledge_gaps(gaps: &[KnowledgeGap], ledger_empty: bool) -> String {
    if ledger_empty {
        return "No progress data available yet. Start recording your learning!".to_string();
    }
    let mut out = String::from("Knowledge Gap Analysis\n\n");
    if gaps.is_empty() {
        out.push_str("No significant gaps found! Keep up the great work.\n");
        return out;
    }
    out.push_str("**Areas needing attention**:\n\n");
    for g in gaps {
        let _ = writeln!(out, "**{}**", g.topic);
        let _ = writeln!(out, "  - Avg mastery: {:.1}/10", g.average_mastery);
        let _ = writeln!(out, "  - Last activity: {} days ago", g.days_since_activity);
        let _ = writeln!(out, "  - Total time: {:.0} minutes\n", g.total_minutes);
    }
    out
}
