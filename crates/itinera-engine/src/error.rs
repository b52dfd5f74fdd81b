//! Engine error types.

use thiserror::Error;

use itinera_models::reference::InvalidReference;
use itinera_proxy::ProxyError;
use itinera_store::StoreError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised by the fetch orchestrator and the generation pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A submitted URL could not be resolved to a video reference.
    #[error("Invalid video reference: {0}")]
    InvalidReference(#[from] InvalidReference),

    /// The submission itself was rejected (batch size, preferences).
    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),

    /// The fallback chain exhausted every mechanism for one video.
    /// Carries the per-attempt trail in chain order.
    #[error("Transcript unavailable after {} attempts", attempts.len())]
    TranscriptUnavailable { attempts: Vec<String> },

    /// The video exists but has no usable transcript (captions disabled,
    /// private or deleted video). Not a connectivity problem: retrying
    /// through other mechanisms cannot help.
    #[error("No transcript for this video: {0}")]
    ContentUnavailable(String),

    /// Every video in the batch came back unusable.
    #[error("No usable content: {0}")]
    NoUsableContent(String),

    /// The synthesizer failed permanently (after retries, or unparseable
    /// output).
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// A pipeline rerun was requested for a completed or failed job.
    #[error("Job {0} is already terminal")]
    JobAlreadyTerminal(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn invalid_submission(msg: impl Into<String>) -> Self {
        Self::InvalidSubmission(msg.into())
    }

    pub fn content_unavailable(msg: impl Into<String>) -> Self {
        Self::ContentUnavailable(msg.into())
    }

    pub fn no_usable_content(msg: impl Into<String>) -> Self {
        Self::NoUsableContent(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::Synthesis(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short human-readable summary, safe to surface on a job record.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::InvalidReference(e) => format!("A submitted URL is not valid: {e}"),
            EngineError::InvalidSubmission(msg) => format!("Submission rejected: {msg}"),
            EngineError::TranscriptUnavailable { .. } => {
                "Could not reach the video service for any submitted video".to_string()
            }
            EngineError::ContentUnavailable(_) => {
                "A submitted video has no transcript available".to_string()
            }
            EngineError::NoUsableContent(_) => {
                "None of the submitted videos yielded usable content".to_string()
            }
            EngineError::Synthesis(_) => "Itinerary generation failed".to_string(),
            EngineError::JobAlreadyTerminal(id) => {
                format!("Job {id} has already finished")
            }
            EngineError::JobNotFound(id) => format!("Job {id} was not found"),
            EngineError::Config(_) => "The service is misconfigured".to_string(),
            EngineError::Proxy(_) => {
                "Could not reach the video service through any proxy".to_string()
            }
            EngineError::Store(_) => "Could not persist job state".to_string(),
        }
    }
}
