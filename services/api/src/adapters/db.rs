//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DoubtStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Each doubt is one row. The whole record lives in the `body` JSONB column so
//! that it round-trips exactly; `course_id`, `status`, `resolved` and `version`
//! are mirrored into plain columns for filtering and for the conditional update.

use async_trait::async_trait;
use doubt_forum_core::domain::Doubt;
use doubt_forum_core::ports::{DoubtQuery, DoubtStore, PortError, PortResult};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DoubtStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DoubtRecord {
    body: Json<Doubt>,
}
impl DoubtRecord {
    fn to_domain(self) -> Doubt {
        self.body.0
    }
}

/// A listed row whose body is decoded separately, so one bad row cannot fail a scan.
#[derive(FromRow)]
struct ListedDoubtRecord {
    id: Uuid,
    body: Json<serde_json::Value>,
}

/// Decodes listed rows, logging and skipping any whose body is not a valid doubt.
fn decode_listed(records: Vec<ListedDoubtRecord>) -> Vec<Doubt> {
    records
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<Doubt>(record.body.0) {
            Ok(doubt) => Some(doubt),
            Err(e) => {
                warn!(doubt_id = %record.id, error = %e, "Skipping undecodable doubt row");
                None
            }
        })
        .collect()
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// `DoubtStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DoubtStore for DbAdapter {
    async fn insert_doubt(&self, doubt: &Doubt) -> PortResult<Doubt> {
        sqlx::query(
            "INSERT INTO doubts (id, course_id, status, resolved, created_at, last_escalated_at, version, body) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(doubt.id)
        .bind(&doubt.course_id)
        .bind(doubt.status.as_str())
        .bind(doubt.resolved)
        .bind(doubt.created_at)
        .bind(doubt.last_escalated_at)
        .bind(doubt.version)
        .bind(Json(doubt))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation());
            if duplicate {
                PortError::Conflict(format!("Doubt {} already exists", doubt.id))
            } else {
                unexpected(e)
            }
        })?;
        Ok(doubt.clone())
    }

    async fn get_doubt(&self, doubt_id: Uuid) -> PortResult<Doubt> {
        let record = sqlx::query_as::<_, DoubtRecord>("SELECT body FROM doubts WHERE id = $1")
            .bind(doubt_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    PortError::NotFound(format!("Doubt {} not found", doubt_id))
                }
                _ => unexpected(e),
            })?;
        Ok(record.to_domain())
    }

    async fn update_doubt(&self, doubt: &Doubt, expected_version: i64) -> PortResult<Doubt> {
        let mut next = doubt.clone();
        next.version = expected_version + 1;

        let result = sqlx::query(
            "UPDATE doubts \
             SET status = $3, resolved = $4, last_escalated_at = $5, version = $6, body = $7 \
             WHERE id = $1 AND version = $2",
        )
        .bind(next.id)
        .bind(expected_version)
        .bind(next.status.as_str())
        .bind(next.resolved)
        .bind(next.last_escalated_at)
        .bind(next.version)
        .bind(Json(&next))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 1 {
            return Ok(next);
        }

        // Nothing matched: either somebody else moved the version, or the row is gone.
        let current: Option<i64> = sqlx::query_scalar("SELECT version FROM doubts WHERE id = $1")
            .bind(doubt.id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unexpected)?;
        match current {
            Some(version) => Err(PortError::Conflict(format!(
                "Doubt {} is at version {}, expected {}",
                doubt.id, version, expected_version
            ))),
            None => Err(PortError::NotFound(format!("Doubt {} not found", doubt.id))),
        }
    }

    async fn list_doubts(&self, query: &DoubtQuery) -> PortResult<Vec<Doubt>> {
        let statuses: Option<Vec<String>> = query
            .statuses
            .as_ref()
            .map(|statuses| statuses.iter().map(|s| s.as_str().to_string()).collect());

        let records = sqlx::query_as::<_, ListedDoubtRecord>(
            "SELECT id, body FROM doubts \
             WHERE ($1::text IS NULL OR course_id = $1) \
               AND ($2::text[] IS NULL OR status = ANY($2)) \
               AND (NOT $3 OR resolved = FALSE) \
             ORDER BY created_at DESC, id ASC",
        )
        .bind(query.course_id.as_deref())
        .bind(statuses)
        .bind(query.unresolved_only)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(decode_listed(records))
    }
}
