// SPDX-License-Identifier: MIT OR Apache-2.0
//! Job-state persistence.

use bgw_core::{JobId, JobState};
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

/// Storage failure. The actor logs these; a broken store never kills a job.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job store unavailable: {0}")]
    Unavailable(String),
}

/// Durable home of [`JobState`] snapshots. Writes are throttled by the
/// actor; reads back the latest persisted snapshot (which may trail the
/// in-memory state by up to one throttle interval).
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get(&self, job_id: JobId) -> Result<Option<JobState>, StoreError>;
    async fn put(&self, state: &JobState) -> Result<(), StoreError>;
    async fn delete(&self, job_id: JobId) -> Result<(), StoreError>;
}

/// In-memory store for tests and single-node runs.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    states: RwLock<HashMap<JobId, JobState>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get(&self, job_id: JobId) -> Result<Option<JobState>, StoreError> {
        Ok(self.states.read().await.get(&job_id).cloned())
    }

    async fn put(&self, state: &JobState) -> Result<(), StoreError> {
        self.states.write().await.insert(state.job_id, state.clone());
        Ok(())
    }

    async fn delete(&self, job_id: JobId) -> Result<(), StoreError> {
        self.states.write().await.remove(&job_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bgw_core::Pipeline;
    use uuid::Uuid;

    #[tokio::test]
    async fn roundtrip_and_delete() {
        let store = MemoryJobStore::new();
        let state = JobState::new(Uuid::new_v4(), Pipeline::CsvImport, 3);
        store.put(&state).await.unwrap();
        assert_eq!(store.get(state.job_id).await.unwrap().unwrap(), state);
        store.delete(state.job_id).await.unwrap();
        assert!(store.get(state.job_id).await.unwrap().is_none());
        assert_eq!(store.len().await, 0);
    }
}
