//! Persistence contract for generation jobs.
//!
//! The pipeline only talks to the [`JobStore`] trait. Updates are partial:
//! each transition sends only the fields it changes via [`JobFields`], so a
//! document-oriented backend can map them to a field-masked update.

pub mod error;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use itinera_models::{GenerationJob, Itinerary, JobId, JobStatus, PerVideoResult};

pub use error::{StoreError, StoreResult};
pub use memory::MemoryJobStore;

/// Partial update applied to a stored job. Unset fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct JobFields {
    pub status: Option<JobStatus>,
    pub progress_percent: Option<u8>,
    pub message: Option<String>,
    pub per_video_results: Option<Vec<PerVideoResult>>,
    pub itinerary: Option<Itinerary>,
    /// Set by the store on every update when `None`.
    pub updated_at: Option<DateTime<Utc>>,
}

impl JobFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn progress(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn per_video_results(mut self, results: Vec<PerVideoResult>) -> Self {
        self.per_video_results = Some(results);
        self
    }

    pub fn itinerary(mut self, itinerary: Itinerary) -> Self {
        self.itinerary = Some(itinerary);
        self
    }

    /// Apply this partial update to a job in place.
    pub fn apply(self, job: &mut GenerationJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress_percent {
            job.progress_percent = progress;
        }
        if let Some(message) = self.message {
            job.message = message;
        }
        if let Some(results) = self.per_video_results {
            job.per_video_results = results;
        }
        if let Some(itinerary) = self.itinerary {
            job.itinerary = Some(itinerary);
        }
        job.updated_at = self.updated_at.unwrap_or_else(Utc::now);
    }
}

/// Persistence backend for generation jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a newly created job.
    async fn create_job(&self, job: &GenerationJob) -> StoreResult<()>;

    /// Fetch a job by ID.
    async fn get_job(&self, job_id: &JobId) -> StoreResult<Option<GenerationJob>>;

    /// Apply a partial update to an existing job.
    async fn update_job(&self, job_id: &JobId, fields: JobFields) -> StoreResult<()>;

    /// Remove a job record. Removing a missing job is not an error.
    async fn delete_job(&self, job_id: &JobId) -> StoreResult<()>;
}
