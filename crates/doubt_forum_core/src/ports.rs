//! crates/doubt_forum_core/src/ports.rs
//!
//! Defines the service contracts (traits) the escalation engine depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! engine independent of the concrete database, model provider, and clock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domain::{Doubt, DoubtStatus};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A conditional write lost against a concurrent writer.
    #[error("Version conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage
//=========================================================================================

/// A scan over stored doubts. Unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoubtQuery {
    pub course_id: Option<String>,
    pub statuses: Option<Vec<DoubtStatus>>,
    pub unresolved_only: bool,
}

impl DoubtQuery {
    pub fn matches(&self, doubt: &Doubt) -> bool {
        if self.unresolved_only && doubt.resolved {
            return false;
        }
        if let Some(course_id) = &self.course_id {
            if &doubt.course_id != course_id {
                return false;
            }
        }
        match &self.statuses {
            Some(statuses) => statuses.contains(&doubt.status),
            None => true,
        }
    }
}

#[async_trait]
pub trait DoubtStore: Send + Sync {
    /// Persists a new doubt. Fails if the id is already taken.
    async fn insert_doubt(&self, doubt: &Doubt) -> PortResult<Doubt>;

    async fn get_doubt(&self, doubt_id: Uuid) -> PortResult<Doubt>;

    /// Replaces the stored doubt if its version still equals `expected_version`.
    ///
    /// On success the stored copy carries `expected_version + 1` and is returned.
    /// A version mismatch is `PortError::Conflict`.
    async fn update_doubt(&self, doubt: &Doubt, expected_version: i64) -> PortResult<Doubt>;

    /// Returns matching doubts, newest first.
    async fn list_doubts(&self, query: &DoubtQuery) -> PortResult<Vec<Doubt>>;
}

//=========================================================================================
// Answer Generation
//=========================================================================================

#[async_trait]
pub trait AnswerGenerationService: Send + Sync {
    /// Produces a tutor answer for a fully formatted prompt.
    async fn generate(&self, prompt: &str) -> PortResult<String>;
}

//=========================================================================================
// Time
//=========================================================================================

/// The source of "now" for the engine and its sweep.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
