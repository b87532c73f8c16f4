//! crates/doubt_forum_core/src/domain.rs
//!
//! Defines the core data structures for the doubt forum.
//! These structs are independent of any database or web framework; they derive
//! `serde` only so that stores can persist a doubt as a single record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::EngineError;

//=========================================================================================
// Status and Actions
//=========================================================================================

/// The visibility tier of a doubt.
///
/// Every doubt starts at `Ai` and ends at `Resolved`; the human tiers are ordered
/// from the cheapest responder (peers) to the most expensive (faculty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoubtStatus {
    /// Answered by the assistant, waiting for the asker to confirm or escalate.
    Ai,
    /// Open to the whole course forum.
    Open,
    /// Visible to senior students.
    SeniorVisible,
    /// Waiting for a professor.
    Professor,
    /// Terminal.
    Resolved,
}

impl DoubtStatus {
    pub const ALL: [DoubtStatus; 5] = [
        DoubtStatus::Ai,
        DoubtStatus::Open,
        DoubtStatus::SeniorVisible,
        DoubtStatus::Professor,
        DoubtStatus::Resolved,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Whether the escalation clock runs in this state.
    pub fn is_escalation_track(self) -> bool {
        matches!(self, Self::Open | Self::SeniorVisible | Self::Professor)
    }

    /// The tier the sweep promotes to from this state, if any.
    pub fn next_tier(self) -> Option<DoubtStatus> {
        match self {
            Self::Open => Some(Self::SeniorVisible),
            Self::SeniorVisible => Some(Self::Professor),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ai => "AI",
            Self::Open => "OPEN",
            Self::SeniorVisible => "SENIOR_VISIBLE",
            Self::Professor => "PROFESSOR",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Whether a viewer holding `role` sees doubts in this state on the forum.
    ///
    /// Askers always see their own doubts; that rule lives in the engine filter.
    pub fn visible_to(self, role: Role) -> bool {
        match role {
            Role::Student => matches!(self, Self::Ai | Self::Open | Self::Resolved),
            Role::Senior => matches!(
                self,
                Self::Ai | Self::Open | Self::SeniorVisible | Self::Resolved
            ),
            Role::Professor => matches!(self, Self::Professor),
        }
    }
}

impl fmt::Display for DoubtStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DoubtStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DoubtStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| EngineError::InvalidAction(format!("unknown status '{}'", s)))
    }
}

/// The two confirmations an asker can give to the assistant's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentAction {
    Solved,
    Confused,
}

impl FromStr for StudentAction {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "SOLVED" => Ok(Self::Solved),
            "CONFUSED" => Ok(Self::Confused),
            other => Err(EngineError::InvalidAction(format!(
                "unrecognized action '{}'",
                other
            ))),
        }
    }
}

//=========================================================================================
// People
//=========================================================================================

/// The role a caller holds, as supplied by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Senior,
    Professor,
}

impl FromStr for Role {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "senior" => Ok(Self::Senior),
            "professor" => Ok(Self::Professor),
            other => Err(EngineError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

/// A named user, e.g. the asker of a doubt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub name: String,
}

/// Who is reading the forum. Drives the role-based visibility filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer {
    pub user_id: String,
    pub role: Role,
}

/// The role recorded on a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplierRole {
    Student,
    Professor,
    Ai,
}

/// The author of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Replier {
    pub user_id: String,
    pub name: String,
    pub role: ReplierRole,
}

//=========================================================================================
// Doubt and its embedded records
//=========================================================================================

/// One contribution to the discussion thread of a doubt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: Uuid,
    pub content: String,
    pub replied_by: Replier,
    pub created_at: DateTime<Utc>,
    pub is_ai: bool,
    /// True only for the reply that resolved the doubt.
    pub is_accepted: bool,
}

/// One audit entry, appended per transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub status: DoubtStatus,
    pub timestamp: DateTime<Utc>,
    pub note: String,
}

/// A student-submitted question with a tracked resolution lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doubt {
    pub id: Uuid,
    pub content: String,
    pub course_id: String,
    pub asked_by: Participant,
    pub created_at: DateTime<Utc>,
    pub status: DoubtStatus,
    pub resolved: bool,
    pub last_escalated_at: Option<DateTime<Utc>>,
    pub ai_answer: String,
    pub replies: Vec<Reply>,
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optimistic-concurrency counter, owned by the store.
    pub version: i64,
}

/// The input for creating a doubt.
#[derive(Debug, Clone)]
pub struct NewDoubt {
    pub content: String,
    pub course_id: String,
    pub asker: Participant,
    pub tags: Vec<String>,
}

/// A read-side filter for listing doubts.
#[derive(Debug, Clone, Default)]
pub struct DoubtFilter {
    pub course_id: Option<String>,
    /// `None` means no role-based restriction.
    pub viewer: Option<Viewer>,
}

//=========================================================================================
// Reports
//=========================================================================================

/// Aggregated counters for one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAnalytics {
    pub course_id: String,
    pub total_doubts: usize,
    pub resolved_doubts: usize,
    /// Percentage in `0.0..=100.0`.
    pub resolution_rate: f64,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCount {
    pub status: DoubtStatus,
    pub count: usize,
}

/// How often a topic comes up in a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicInsight {
    pub topic: String,
    pub count: usize,
}
