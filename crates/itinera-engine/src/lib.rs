//! Itinerary generation engine.
//!
//! Wires the resolver, proxy pool, fetch orchestrator, batch coordinator
//! and synthesizer into a job pipeline with persisted progress.

pub mod batch;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod pipeline;
pub mod retry;
pub mod synth;
pub mod transport;

pub use batch::BatchCoordinator;
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use fetch::FetchOrchestrator;
pub use logging::JobLogger;
pub use pipeline::{GenerationPipeline, JobSnapshot};
pub use retry::{retry_async, RetryConfig};
pub use synth::{GeminiSynthesizer, SynthesisError, Synthesizer};
pub use transport::{HttpTranscriptTransport, TranscriptTransport, TransportError};
