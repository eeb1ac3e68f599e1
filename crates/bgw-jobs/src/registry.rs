// SPDX-License-Identifier: MIT OR Apache-2.0
//! The job registry: spawns actors, hands out handles, prunes the retired.

use crate::actor::{JobActorConfig, JobHandle};
use crate::store::JobStore;
use crate::token::AuthToken;
use bgw_core::{JobId, JobState, Pipeline};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Creates and addresses job actors. One handle per live job id.
pub struct JobRegistry {
    jobs: DashMap<JobId, JobHandle>,
    store: Arc<dyn JobStore>,
    config: JobActorConfig,
    retired_tx: mpsc::UnboundedSender<JobId>,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>) -> Arc<Self> {
        Self::with_config(store, JobActorConfig::default())
    }

    /// Registry with custom actor timing (tests shrink the delays).
    pub fn with_config(store: Arc<dyn JobStore>, config: JobActorConfig) -> Arc<Self> {
        let (retired_tx, mut retired_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            jobs: DashMap::new(),
            store,
            config,
            retired_tx,
        });

        // Prune handles whose actors finished their cleanup.
        let pruner = Arc::downgrade(&registry);
        tokio::spawn(async move {
            while let Some(job_id) = retired_rx.recv().await {
                let Some(registry) = pruner.upgrade() else {
                    return;
                };
                registry.jobs.remove(&job_id);
            }
        });

        registry
    }

    /// Allocate a job id, spawn its actor, and issue its first token.
    /// An explicit `job_id` lets a client re-use an id it generated.
    pub fn create(&self, pipeline: Pipeline, job_id: Option<JobId>) -> (JobHandle, AuthToken) {
        let job_id = job_id.unwrap_or_else(Uuid::new_v4);
        let handle = JobHandle::spawn(
            job_id,
            pipeline,
            Arc::clone(&self.store),
            self.config,
            Some(self.retired_tx.clone()),
        );
        let token = AuthToken::issue();
        handle.set_token(token);
        self.jobs.insert(job_id, handle.clone());
        (handle, token)
    }

    /// Look up a live job.
    pub fn get(&self, job_id: JobId) -> Option<JobHandle> {
        let handle = self.jobs.get(&job_id)?.clone();
        if handle.is_alive() {
            Some(handle)
        } else {
            self.jobs.remove(&job_id);
            None
        }
    }

    /// Current state: the live actor's snapshot, or the last persisted one.
    pub async fn job_state(&self, job_id: JobId) -> Option<JobState> {
        if let Some(handle) = self.get(job_id) {
            if let Some(state) = handle.snapshot().await {
                return Some(state);
            }
        }
        self.store.get(job_id).await.ok().flatten()
    }

    /// Live job count.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;
    use bgw_core::JobStatus;

    #[tokio::test]
    async fn create_issues_token_and_registers() {
        let registry = JobRegistry::new(Arc::new(MemoryJobStore::new()));
        let (handle, token) = registry.create(Pipeline::CsvImport, None);
        assert!(registry.get(handle.job_id()).is_some());
        assert!(token.expires_in_secs(chrono::Utc::now()) > 0);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn explicit_job_id_is_honored() {
        let registry = JobRegistry::new(Arc::new(MemoryJobStore::new()));
        let id = Uuid::new_v4();
        let (handle, _) = registry.create(Pipeline::AiScan, Some(id));
        assert_eq!(handle.job_id(), id);
    }

    #[tokio::test]
    async fn state_prefers_live_actor_over_store() {
        let store = Arc::new(MemoryJobStore::new());
        let registry = JobRegistry::new(Arc::clone(&store) as Arc<dyn JobStore>);
        let (handle, _) = registry.create(Pipeline::BatchEnrichment, None);
        handle.initialize(5).await;

        let state = registry.job_state(handle.job_id()).await.unwrap();
        assert_eq!(state.total_count, 5);
        assert_eq!(state.status, JobStatus::Initialized);
    }

    #[tokio::test]
    async fn unknown_job_has_no_state() {
        let registry = JobRegistry::new(Arc::new(MemoryJobStore::new()));
        assert!(registry.job_state(Uuid::new_v4()).await.is_none());
    }
}
