//! In-memory job store.
//!
//! Default backend for single-process deployments and tests. Jobs live in a
//! `HashMap` behind an async `RwLock`; clones are returned so callers never
//! hold references into the map.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use itinera_models::{GenerationJob, JobId};

use crate::error::{StoreError, StoreResult};
use crate::{JobFields, JobStore};

/// Thread-safe in-memory implementation of [`JobStore`].
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    jobs: Arc<RwLock<HashMap<String, GenerationJob>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently stored.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, job: &GenerationJob) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.job_id.as_str()) {
            return Err(StoreError::already_exists(job.job_id.as_str()));
        }
        jobs.insert(job.job_id.as_str().to_string(), job.clone());
        debug!(job_id = %job.job_id, "Created job record");
        Ok(())
    }

    async fn get_job(&self, job_id: &JobId) -> StoreResult<Option<GenerationJob>> {
        Ok(self.jobs.read().await.get(job_id.as_str()).cloned())
    }

    async fn update_job(&self, job_id: &JobId, fields: JobFields) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id.as_str())
            .ok_or_else(|| StoreError::not_found(job_id.as_str()))?;
        fields.apply(job);
        Ok(())
    }

    async fn delete_job(&self, job_id: &JobId) -> StoreResult<()> {
        self.jobs.write().await.remove(job_id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itinera_models::{reference::resolve, JobStatus, TravelPreferences};

    fn sample_job() -> GenerationJob {
        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();
        GenerationJob::new(vec![reference], TravelPreferences::default())
    }

    #[tokio::test]
    async fn test_create_get_roundtrip() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        store.create_job(&job).await.unwrap();

        let fetched = store.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.job_id, job.job_id);
        assert_eq!(fetched.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        store.create_job(&job).await.unwrap();
        let err = store.create_job(&job).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_partial_update_leaves_other_fields() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        store.create_job(&job).await.unwrap();

        store
            .update_job(
                &job.job_id,
                JobFields::new()
                    .status(JobStatus::Fetching)
                    .progress(10)
                    .message("Fetching video content"),
            )
            .await
            .unwrap();

        let fetched = store.get_job(&job.job_id).await.unwrap().unwrap();
        assert_eq!(fetched.status, JobStatus::Fetching);
        assert_eq!(fetched.progress_percent, 10);
        assert_eq!(fetched.message, "Fetching video content");
        assert_eq!(fetched.references.len(), 1);
        assert!(fetched.updated_at >= fetched.created_at);
    }

    #[tokio::test]
    async fn test_update_missing_job_is_not_found() {
        let store = MemoryJobStore::new();
        let err = store
            .update_job(&JobId::new(), JobFields::new().progress(50))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryJobStore::new();
        let job = sample_job();
        store.create_job(&job).await.unwrap();

        store.delete_job(&job.job_id).await.unwrap();
        assert!(store.get_job(&job.job_id).await.unwrap().is_none());
        // Deleting again is a no-op.
        store.delete_job(&job.job_id).await.unwrap();
    }
}
