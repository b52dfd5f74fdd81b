//! Shared data models for the Itinera backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video references and the URL resolver
//! - Generation jobs and their lifecycle states
//! - Fetch results (transcripts, metadata, attempt records)
//! - Traveler preferences
//! - The structured itinerary output schema

pub mod fetch;
pub mod itinerary;
pub mod job;
pub mod preferences;
pub mod reference;

// Re-export common types
pub use fetch::{
    FetchAttempt, FetchMechanism, FetchPayload, FetchResult, FetchStatus, Transcript,
    TranscriptSegment, VideoMetadata,
};
pub use itinerary::{
    Activity, BudgetBreakdown, DayPlan, Itinerary, MealRecommendation, TranscriptAnalysis,
};
pub use job::{GenerationJob, JobId, JobStatus, PerVideoResult};
pub use preferences::{AccommodationTier, ActivityStyle, TravelPreferences, TripType};
pub use reference::{resolve, InvalidReference, UrlShape, VideoReference};
