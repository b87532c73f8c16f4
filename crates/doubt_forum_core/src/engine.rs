//! crates/doubt_forum_core/src/engine.rs
//!
//! The escalation engine: owns the lifecycle of doubts on top of the ports.
//!
//! Every write is an optimistic read-modify-write. The transition guard is
//! evaluated against the copy that was read and the store only accepts the
//! write if nobody else wrote in between; on a conflict the engine re-reads and
//! re-evaluates. A sweep decision made on stale data can therefore never undo a
//! concurrent resolution.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analytics;
use crate::domain::{
    CourseAnalytics, Doubt, DoubtFilter, DoubtStatus, NewDoubt, Participant, StudentAction,
    TopicInsight,
};
use crate::error::{EngineError, EngineResult};
use crate::lifecycle::{require_text, EscalationPolicy};
use crate::ports::{AnswerGenerationService, Clock, DoubtQuery, DoubtStore, PortError};

/// Conditional writes attempted before giving up on a contended doubt.
pub const MAX_WRITE_ATTEMPTS: usize = 5;

/// Stored as the answer when generation fails or times out.
pub const DEGRADED_ANSWER: &str =
    "I encountered an error while thinking. Please mark this as confusing to ask the forum.";

const TUTOR_PROMPT: &str = r#"You are a helpful AI tutor on a university learning platform. A student has asked the following question:

"{question}"

Provide a clear, precise and educational answer in plain text without any markdown formatting. Include examples if relevant. If the question is too complex to settle here, suggest asking a professor."#;

pub fn tutor_prompt(question: &str) -> String {
    TUTOR_PROMPT.replace("{question}", question)
}

/// The result of one read-modify-write.
#[derive(Debug, Clone)]
pub(crate) struct Mutation {
    pub(crate) doubt: Doubt,
    /// False when the guard no longer held on the fresh state and nothing was written.
    pub(crate) changed: bool,
}

pub struct EscalationEngine {
    store: Arc<dyn DoubtStore>,
    answers: Arc<dyn AnswerGenerationService>,
    clock: Arc<dyn Clock>,
    policy: EscalationPolicy,
}

impl EscalationEngine {
    pub fn new(
        store: Arc<dyn DoubtStore>,
        answers: Arc<dyn AnswerGenerationService>,
        clock: Arc<dyn Clock>,
        policy: EscalationPolicy,
    ) -> Self {
        Self {
            store,
            answers,
            clock,
            policy,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    //=====================================================================================
    // Commands
    //=====================================================================================

    /// Creates a doubt in `AI`, with the assistant's answer attached.
    ///
    /// Answer generation is bounded by the policy timeout and never fails the
    /// creation; a placeholder answer is stored instead.
    pub async fn create_doubt(&self, input: NewDoubt) -> EngineResult<Doubt> {
        let content = require_text("content", &input.content)?;
        let ai_answer = self.generate_answer(&content).await;

        let doubt = Doubt::new(input, ai_answer, self.clock.now())?;
        let saved = self.store.insert_doubt(&doubt).await?;
        info!(doubt_id = %saved.id, course_id = %saved.course_id, "Doubt created");
        Ok(saved)
    }

    async fn generate_answer(&self, content: &str) -> String {
        let prompt = tutor_prompt(content);
        let timeout = self.policy.answer_timeout;

        let degraded = match tokio::time::timeout(timeout, self.answers.generate(&prompt)).await {
            Ok(Ok(answer)) if !answer.trim().is_empty() => return answer.trim().to_string(),
            Ok(Ok(_)) => EngineError::AiGenerationDegraded("empty answer".to_string()),
            Ok(Err(err)) => EngineError::AiGenerationDegraded(err.to_string()),
            Err(_) => EngineError::AiGenerationDegraded(format!(
                "no answer within {}s",
                timeout.as_secs_f64()
            )),
        };
        warn!(error = %degraded, "Storing placeholder answer");
        DEGRADED_ANSWER.to_string()
    }

    pub async fn get_doubt(&self, doubt_id: Uuid) -> EngineResult<Doubt> {
        Ok(self.store.get_doubt(doubt_id).await?)
    }

    /// `SOLVED` resolves, `CONFUSED` opens the doubt to the forum and starts the clock.
    pub async fn apply_student_action(
        &self,
        doubt_id: Uuid,
        action: StudentAction,
    ) -> EngineResult<Doubt> {
        let now = self.clock.now();
        let mutation = self
            .mutate(doubt_id, None, |doubt| {
                doubt.apply_student_action(action, now)?;
                Ok(true)
            })
            .await?;
        info!(
            doubt_id = %doubt_id,
            action = ?action,
            status = %mutation.doubt.status,
            "Student action applied"
        );
        Ok(mutation.doubt)
    }

    /// Adds a reply. An authority reply also resolves the doubt.
    pub async fn submit_reply(
        &self,
        doubt_id: Uuid,
        content: &str,
        replier: Participant,
        is_authority: bool,
    ) -> EngineResult<Doubt> {
        let now = self.clock.now();
        let mutation = self
            .mutate(doubt_id, None, |doubt| {
                doubt.add_reply(content, replier.clone(), is_authority, now)?;
                Ok(true)
            })
            .await?;
        if is_authority {
            info!(
                doubt_id = %doubt_id,
                replier = %replier.user_id,
                "Doubt resolved by authority reply"
            );
        }
        Ok(mutation.doubt)
    }

    /// Promotes every unresolved doubt whose time guard holds at `now`.
    ///
    /// Never fails: a failed scan promotes nothing, and a doubt that cannot be
    /// written is logged and skipped. Each doubt moves at most one tier per call.
    pub async fn run_escalation_sweep(&self, now: DateTime<Utc>) -> usize {
        let query = DoubtQuery {
            statuses: Some(vec![DoubtStatus::Open, DoubtStatus::SeniorVisible]),
            unresolved_only: true,
            ..Default::default()
        };
        let candidates = match self.store.list_doubts(&query).await {
            Ok(doubts) => doubts,
            Err(err) => {
                error!(error = %err, "Escalation sweep could not scan doubts");
                return 0;
            }
        };

        let policy = self.policy;
        let mut promoted = 0;
        for doubt in candidates {
            if doubt.escalation_due(now, &policy).is_none() {
                continue;
            }
            let doubt_id = doubt.id;
            let from = doubt.status;

            let result = self
                .mutate(doubt_id, Some(doubt), |doubt| {
                    Ok(doubt.escalate_if_due(now, &policy)?.is_some())
                })
                .await;
            match result {
                Ok(Mutation {
                    doubt,
                    changed: true,
                }) => {
                    promoted += 1;
                    info!(
                        doubt_id = %doubt_id,
                        from = %from,
                        to = %doubt.status,
                        "Doubt escalated"
                    );
                }
                Ok(_) => {
                    debug!(
                        doubt_id = %doubt_id,
                        "Escalation no longer due after concurrent change"
                    );
                }
                Err(err) => {
                    warn!(doubt_id = %doubt_id, error = %err, "Skipping doubt in escalation sweep");
                }
            }
        }

        if promoted > 0 {
            info!(promoted, "Escalation sweep complete");
        }
        promoted
    }

    /// Reads, applies `change`, and writes conditionally; retries on conflicts.
    ///
    /// `seed` is used as the first read when the caller already holds a copy.
    /// `change` returns `Ok(false)` when there is nothing to write.
    async fn mutate<F>(
        &self,
        doubt_id: Uuid,
        mut seed: Option<Doubt>,
        mut change: F,
    ) -> EngineResult<Mutation>
    where
        F: FnMut(&mut Doubt) -> EngineResult<bool> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut doubt = match seed.take() {
                Some(doubt) => doubt,
                None => self.store.get_doubt(doubt_id).await?,
            };
            let expected_version = doubt.version;

            if !change(&mut doubt)? {
                return Ok(Mutation {
                    doubt,
                    changed: false,
                });
            }

            match self.store.update_doubt(&doubt, expected_version).await {
                Ok(saved) => {
                    return Ok(Mutation {
                        doubt: saved,
                        changed: true,
                    })
                }
                Err(PortError::Conflict(reason)) => {
                    debug!(
                        doubt_id = %doubt_id,
                        attempt,
                        reason = %reason,
                        "Write conflict, re-reading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(EngineError::StorageUnavailable(format!(
            "doubt {} still contended after {} attempts",
            doubt_id, MAX_WRITE_ATTEMPTS
        )))
    }

    //=====================================================================================
    // Queries
    //=====================================================================================

    /// Lists doubts newest first, restricted by course and by what the viewer may see.
    pub async fn list_doubts(&self, filter: &DoubtFilter) -> EngineResult<Vec<Doubt>> {
        let query = DoubtQuery {
            course_id: filter.course_id.clone(),
            ..Default::default()
        };
        let doubts = self.store.list_doubts(&query).await?;

        let Some(viewer) = &filter.viewer else {
            return Ok(doubts);
        };
        Ok(doubts
            .into_iter()
            .filter(|doubt| doubt.is_visible_to(viewer))
            .collect())
    }

    /// Doubts waiting for a professor, longest waiting first.
    pub async fn professor_queue(&self, course_id: Option<&str>) -> EngineResult<Vec<Doubt>> {
        let query = DoubtQuery {
            course_id: course_id.map(str::to_string),
            statuses: Some(vec![DoubtStatus::Professor]),
            unresolved_only: true,
        };
        let mut doubts = self.store.list_doubts(&query).await?;
        analytics::sort_longest_waiting_first(&mut doubts);
        Ok(doubts)
    }

    pub async fn course_analytics(&self, course_id: &str) -> EngineResult<CourseAnalytics> {
        let doubts = self.course_doubts(course_id).await?;
        Ok(analytics::course_analytics(course_id, &doubts))
    }

    pub async fn confusion_insights(
        &self,
        course_id: &str,
        limit: usize,
    ) -> EngineResult<Vec<TopicInsight>> {
        let doubts = self.course_doubts(course_id).await?;
        Ok(analytics::confusion_insights(&doubts, limit))
    }

    async fn course_doubts(&self, course_id: &str) -> EngineResult<Vec<Doubt>> {
        let query = DoubtQuery {
            course_id: Some(course_id.to_string()),
            ..Default::default()
        };
        Ok(self.store.list_doubts(&query).await?)
    }
}
