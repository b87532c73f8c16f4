//! crates/doubt_forum_core/src/lifecycle.rs
//!
//! The doubt state machine: the legal edge table and the transitions a single
//! doubt can take. Everything here is synchronous and storage-agnostic; the
//! engine wraps these methods in a read-modify-write against the store.
//!
//! ```text
//! AI ──SOLVED──────────────────────────────────────────────▶ RESOLVED
//!  └──CONFUSED──▶ OPEN ──T_SENIOR──▶ SENIOR_VISIBLE ──T_PROFESSOR──▶ PROFESSOR
//!                  any non-terminal state ──professor reply──▶ RESOLVED
//! ```

use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::{
    Doubt, DoubtStatus, HistoryEntry, NewDoubt, Participant, Replier, ReplierRole, Reply,
    StudentAction, Viewer,
};
use crate::error::{EngineError, EngineResult};

pub const NOTE_CREATED: &str = "AI generated answer";
pub const NOTE_STUDENT_SOLVED: &str = "Student confirmed AI solution";
pub const NOTE_STUDENT_CONFUSED: &str = "Student escalated to forum";
pub const NOTE_TO_SENIORS: &str = "Auto-escalated to seniors";
pub const NOTE_TO_PROFESSOR: &str = "Auto-escalated to professor";
pub const NOTE_PROFESSOR_RESOLVED: &str = "Professor resolved via reply";

/// Time thresholds for the escalation track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationPolicy {
    /// `T_SENIOR`: time spent in `OPEN` before seniors see the doubt.
    pub senior_after: chrono::Duration,
    /// `T_PROFESSOR`: time spent in `SENIOR_VISIBLE` before it reaches a professor.
    pub professor_after: chrono::Duration,
    /// Upper bound on answer generation during creation.
    pub answer_timeout: Duration,
}

impl EscalationPolicy {
    fn threshold_for(&self, status: DoubtStatus) -> Option<chrono::Duration> {
        match status {
            DoubtStatus::Open => Some(self.senior_after),
            DoubtStatus::SeniorVisible => Some(self.professor_after),
            _ => None,
        }
    }
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            senior_after: chrono::Duration::minutes(30),
            professor_after: chrono::Duration::hours(2),
            answer_timeout: Duration::from_secs(30),
        }
    }
}

/// Legal edges of the doubt state graph.
pub fn is_legal_transition(from: DoubtStatus, to: DoubtStatus) -> bool {
    use DoubtStatus::*;

    // An authority reply (or a satisfied asker) may close any open doubt.
    if to == Resolved && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Ai, Open) | (Open, SeniorVisible) | (SeniorVisible, Professor)
    )
}

/// Rejects blank text, returning the trimmed content otherwise.
pub fn require_text(field: &str, text: &str) -> EngineResult<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(EngineError::Validation(format!("{} must not be empty", field)));
    }
    Ok(trimmed.to_string())
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

impl Doubt {
    /// Builds a fresh doubt in state `AI` with its single creation history entry.
    pub fn new(input: NewDoubt, ai_answer: String, now: DateTime<Utc>) -> EngineResult<Self> {
        let content = require_text("content", &input.content)?;
        Ok(Self {
            id: Uuid::new_v4(),
            content,
            course_id: input.course_id,
            asked_by: input.asker,
            created_at: now,
            status: DoubtStatus::Ai,
            resolved: false,
            last_escalated_at: None,
            ai_answer,
            replies: Vec::new(),
            history: vec![HistoryEntry {
                status: DoubtStatus::Ai,
                timestamp: now,
                note: NOTE_CREATED.to_string(),
            }],
            tags: normalize_tags(input.tags),
            version: 0,
        })
    }

    /// Moves the doubt along one legal edge and records it.
    pub fn transition_to(
        &mut self,
        to: DoubtStatus,
        now: DateTime<Utc>,
        note: &str,
    ) -> EngineResult<()> {
        if !is_legal_transition(self.status, to) {
            return Err(EngineError::InvalidAction(format!(
                "cannot move doubt {} from {} to {}",
                self.id, self.status, to
            )));
        }

        tracing::debug!(doubt_id = %self.id, from = %self.status, to = %to, "Doubt transition");

        self.status = to;
        if to.is_escalation_track() {
            self.last_escalated_at = Some(now);
        }
        if to == DoubtStatus::Resolved {
            self.resolved = true;
        }
        self.history.push(HistoryEntry {
            status: to,
            timestamp: now,
            note: note.to_string(),
        });
        Ok(())
    }

    /// The asker's verdict on the assistant's answer. Only valid while in `AI`.
    pub fn apply_student_action(
        &mut self,
        action: StudentAction,
        now: DateTime<Utc>,
    ) -> EngineResult<()> {
        if self.status != DoubtStatus::Ai {
            return Err(EngineError::InvalidAction(format!(
                "doubt {} is {}, student actions are only accepted in AI",
                self.id, self.status
            )));
        }
        match action {
            StudentAction::Solved => {
                self.transition_to(DoubtStatus::Resolved, now, NOTE_STUDENT_SOLVED)
            }
            StudentAction::Confused => {
                self.transition_to(DoubtStatus::Open, now, NOTE_STUDENT_CONFUSED)
            }
        }
    }

    /// Appends a reply; an authority reply also resolves the doubt and is marked accepted.
    ///
    /// Returns the id of the new reply.
    pub fn add_reply(
        &mut self,
        content: &str,
        replier: Participant,
        is_authority: bool,
        now: DateTime<Utc>,
    ) -> EngineResult<Uuid> {
        if self.resolved {
            return Err(EngineError::InvalidAction(format!(
                "doubt {} is already resolved",
                self.id
            )));
        }
        let content = require_text("reply content", content)?;

        let reply = Reply {
            id: Uuid::new_v4(),
            content,
            replied_by: Replier {
                user_id: replier.user_id,
                name: replier.name,
                role: if is_authority {
                    ReplierRole::Professor
                } else {
                    ReplierRole::Student
                },
            },
            created_at: now,
            is_ai: false,
            is_accepted: is_authority,
        };
        let reply_id = reply.id;

        if is_authority {
            self.transition_to(DoubtStatus::Resolved, now, NOTE_PROFESSOR_RESOLVED)?;
        }
        self.replies.push(reply);
        Ok(reply_id)
    }

    /// Askers always see their own doubts; everyone else sees what their role allows.
    pub fn is_visible_to(&self, viewer: &Viewer) -> bool {
        self.asked_by.user_id == viewer.user_id || self.status.visible_to(viewer.role)
    }

    /// The tier the sweep should promote this doubt to at `now`, if its guard holds.
    pub fn escalation_due(
        &self,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> Option<DoubtStatus> {
        if self.resolved {
            return None;
        }
        let next = self.status.next_tier()?;
        let threshold = policy.threshold_for(self.status)?;
        let since = self.last_escalated_at?;
        (now - since >= threshold).then_some(next)
    }

    /// Applies the time-based promotion if due. Returns the new status when promoted.
    pub fn escalate_if_due(
        &mut self,
        now: DateTime<Utc>,
        policy: &EscalationPolicy,
    ) -> EngineResult<Option<DoubtStatus>> {
        let Some(next) = self.escalation_due(now, policy) else {
            return Ok(None);
        };
        let note = match next {
            DoubtStatus::SeniorVisible => NOTE_TO_SENIORS,
            _ => NOTE_TO_PROFESSOR,
        };
        self.transition_to(next, now, note)?;
        Ok(Some(next))
    }
}
