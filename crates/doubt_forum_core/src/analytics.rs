//! crates/doubt_forum_core/src/analytics.rs
//!
//! Course-level reports computed over a set of doubts.

use std::collections::HashMap;

use crate::domain::{CourseAnalytics, Doubt, DoubtStatus, StatusCount, TopicInsight};

/// Characters of content used as the topic of an untagged doubt.
pub const UNTAGGED_TOPIC_CHARS: usize = 50;

pub const DEFAULT_INSIGHT_LIMIT: usize = 10;

pub fn course_analytics(course_id: &str, doubts: &[Doubt]) -> CourseAnalytics {
    let total_doubts = doubts.len();
    let resolved_doubts = doubts.iter().filter(|d| d.resolved).count();
    let resolution_rate = if total_doubts > 0 {
        resolved_doubts as f64 / total_doubts as f64 * 100.0
    } else {
        0.0
    };

    let by_status = DoubtStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: doubts.iter().filter(|d| d.status == status).count(),
        })
        .collect();

    CourseAnalytics {
        course_id: course_id.to_string(),
        total_doubts,
        resolved_doubts,
        resolution_rate,
        by_status,
    }
}

fn topics_of(doubt: &Doubt) -> Vec<String> {
    if doubt.tags.is_empty() {
        vec![doubt.content.chars().take(UNTAGGED_TOPIC_CHARS).collect()]
    } else {
        doubt.tags.clone()
    }
}

/// Most frequent topics first; ties broken alphabetically.
pub fn confusion_insights(doubts: &[Doubt], limit: usize) -> Vec<TopicInsight> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for doubt in doubts {
        for topic in topics_of(doubt) {
            *counts.entry(topic).or_default() += 1;
        }
    }

    let mut insights: Vec<TopicInsight> = counts
        .into_iter()
        .map(|(topic, count)| TopicInsight { topic, count })
        .collect();
    insights.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.topic.cmp(&b.topic)));
    insights.truncate(limit);
    insights
}

/// Orders a professor's queue so the longest-waiting doubt comes first.
pub fn sort_longest_waiting_first(doubts: &mut [Doubt]) {
    doubts.sort_by(|a, b| {
        a.last_escalated_at
            .cmp(&b.last_escalated_at)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}
