//! crates/doubt_forum_core/src/memory.rs
//!
//! An in-process `DoubtStore`. Used when no database is configured and by tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::Doubt;
use crate::ports::{DoubtQuery, DoubtStore, PortError, PortResult};

/// Keeps every doubt in a map guarded by a single lock.
///
/// Conditional updates compare versions under the write lock, which gives the
/// same single-writer-per-doubt contract as the database adapter.
#[derive(Debug, Default)]
pub struct InMemoryDoubtStore {
    doubts: RwLock<HashMap<Uuid, Doubt>>,
}

impl InMemoryDoubtStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn is_empty(&self) -> bool {
        self.doubts.read().await.is_empty()
    }
}

#[async_trait]
impl DoubtStore for InMemoryDoubtStore {
    async fn insert_doubt(&self, doubt: &Doubt) -> PortResult<Doubt> {
        let mut doubts = self.doubts.write().await;
        if doubts.contains_key(&doubt.id) {
            return Err(PortError::Conflict(format!(
                "Doubt {} already exists",
                doubt.id
            )));
        }
        doubts.insert(doubt.id, doubt.clone());
        Ok(doubt.clone())
    }

    async fn get_doubt(&self, doubt_id: Uuid) -> PortResult<Doubt> {
        self.doubts
            .read()
            .await
            .get(&doubt_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Doubt {} not found", doubt_id)))
    }

    async fn update_doubt(&self, doubt: &Doubt, expected_version: i64) -> PortResult<Doubt> {
        let mut doubts = self.doubts.write().await;
        let stored = doubts
            .get_mut(&doubt.id)
            .ok_or_else(|| PortError::NotFound(format!("Doubt {} not found", doubt.id)))?;

        if stored.version != expected_version {
            return Err(PortError::Conflict(format!(
                "Doubt {} is at version {}, expected {}",
                doubt.id, stored.version, expected_version
            )));
        }

        let mut next = doubt.clone();
        next.version = expected_version + 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn list_doubts(&self, query: &DoubtQuery) -> PortResult<Vec<Doubt>> {
        let doubts = self.doubts.read().await;
        let mut matching: Vec<Doubt> = doubts
            .values()
            .filter(|doubt| query.matches(doubt))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(matching)
    }
}
