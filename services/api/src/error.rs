//! services/api/src/error.rs
//!
//! Defines the primary error type for the API service, plus the mapping of
//! engine errors onto HTTP responses.

use crate::config::ConfigError;
use axum::http::StatusCode;
use doubt_forum_core::EngineError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a failure while applying the embedded migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// Maps an engine failure to the status code and message a handler returns.
///
/// Business-rule failures become 4xx; only storage trouble is a 503.
pub fn engine_error_response(err: EngineError) -> (StatusCode, String) {
    let status = match &err {
        EngineError::Validation(_) => StatusCode::BAD_REQUEST,
        EngineError::NotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InvalidAction(_) => StatusCode::CONFLICT,
        EngineError::StorageUnavailable(_) | EngineError::AiGenerationDegraded(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
        return (status, "Service temporarily unavailable".to_string());
    }
    (status, err.to_string())
}
