//! Generation job aggregate and lifecycle states.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::itinerary::Itinerary;
use crate::preferences::TravelPreferences;
use crate::reference::VideoReference;

/// Unique identifier for a generation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a generation job.
///
/// Transitions are monotonic (`queued → fetching → analyzing → synthesizing
/// → completed`); `failed` is reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job accepted, pipeline not yet started
    #[default]
    Queued,
    /// Transcripts are being fetched for the batch
    Fetching,
    /// Fetched content is being aggregated
    Analyzing,
    /// The synthesizer is generating the itinerary
    Synthesizing,
    /// Itinerary generated successfully
    Completed,
    /// Job failed (terminal)
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Fetching => "fetching",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Synthesizing => "synthesizing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-video outcome recorded on the job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PerVideoResult {
    /// Canonical video id
    pub canonical_id: String,
    /// Raw URL the caller submitted
    pub raw_url: String,
    /// Whether a usable transcript was obtained
    pub usable: bool,
    /// Video title, when metadata was available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Error summary for unusable videos
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Root aggregate for one itinerary-generation run.
///
/// Created at submission, mutated only by the pipeline, immutable once
/// terminal except via explicit deletion.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    /// Unique job ID
    pub job_id: JobId,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Progress in percent (0-100), monotonically non-decreasing
    #[serde(default)]
    pub progress_percent: u8,

    /// Human-readable status summary (never a raw error chain)
    pub message: String,

    /// References this job was submitted with
    pub references: Vec<VideoReference>,

    /// Traveler preferences captured at submission
    #[serde(default)]
    pub preferences: TravelPreferences,

    /// Per-video fetch outcomes, populated during the fetching stage
    #[serde(default)]
    pub per_video_results: Vec<PerVideoResult>,

    /// Generated itinerary, present once completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub itinerary: Option<Itinerary>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a new queued job for the given references.
    pub fn new(references: Vec<VideoReference>, preferences: TravelPreferences) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            status: JobStatus::Queued,
            progress_percent: 0,
            message: "Generation queued".to_string(),
            references,
            preferences,
            per_video_results: Vec::new(),
            itinerary: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
