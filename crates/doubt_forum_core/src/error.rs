//! crates/doubt_forum_core/src/error.rs
//!
//! The error type returned by engine operations.

use crate::ports::PortError;

/// Errors surfaced by the escalation engine.
///
/// Business-rule failures (`Validation`, `NotFound`, `InvalidAction`) are kept
/// distinct from `StorageUnavailable` so callers can tell a bad request from a
/// backend outage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Doubt not found: {0}")]
    NotFound(String),
    #[error("Invalid action: {0}")]
    InvalidAction(String),
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// Non-fatal. Only ever logged, never returned from an operation.
    #[error("AI answer generation degraded: {0}")]
    AiGenerationDegraded(String),
}

impl From<PortError> for EngineError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => EngineError::NotFound(what),
            PortError::Conflict(what) | PortError::Unexpected(what) => {
                EngineError::StorageUnavailable(what)
            }
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
