//! Fetch result types shared between the orchestrator and the pipeline.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reference::VideoReference;

/// Video metadata from the oEmbed endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    pub author_name: String,
    pub author_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

/// A single timed transcript segment.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptSegment {
    pub text: String,
    /// Offset from video start, in seconds
    pub start: f64,
    /// Segment duration, in seconds
    pub duration: f64,
}

/// Complete transcript for one video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    pub video_id: String,
    /// BCP-47 language code of the caption track
    pub language_code: String,
    /// Whether the track was auto-generated
    pub is_generated: bool,
    pub segments: Vec<TranscriptSegment>,
    /// Segments joined into one searchable string
    pub full_text: String,
}

impl Transcript {
    /// Build a transcript from segments, deriving `full_text`.
    pub fn from_segments(
        video_id: impl Into<String>,
        language_code: impl Into<String>,
        is_generated: bool,
        segments: Vec<TranscriptSegment>,
    ) -> Self {
        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            video_id: video_id.into(),
            language_code: language_code.into(),
            is_generated,
            segments,
            full_text,
        }
    }
}

/// Fetch mechanism within the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchMechanism {
    /// No proxy
    Direct,
    /// Endpoint acquired from the shared pool
    PooledProxy,
    /// Operator-configured override proxy
    ManualProxy,
}

impl std::fmt::Display for FetchMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FetchMechanism::Direct => "direct",
            FetchMechanism::PooledProxy => "pooled_proxy",
            FetchMechanism::ManualProxy => "manual_proxy",
        };
        write!(f, "{s}")
    }
}

/// Record of one fetch attempt. Ephemeral: used for scoring feedback and
/// for the attempt trail carried by exhaustion errors.
#[derive(Debug, Clone)]
pub struct FetchAttempt {
    pub canonical_id: String,
    pub mechanism: FetchMechanism,
    /// Proxy address used, if any
    pub proxy: Option<String>,
    pub started_at: DateTime<Utc>,
    pub latency: Duration,
    /// Error message when the attempt failed
    pub error: Option<String>,
}

impl FetchAttempt {
    /// One-line summary for error trails and logs.
    pub fn summary(&self) -> String {
        let via = self.proxy.as_deref().unwrap_or("-");
        let ms = self.latency.as_millis();
        match &self.error {
            Some(e) => format!("{} via {} after {}ms: {}", self.mechanism, via, ms, e),
            None => format!("{} via {} after {}ms: ok", self.mechanism, via, ms),
        }
    }
}

/// Outcome status of a per-video fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Error,
}

/// Extracted content for one video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchPayload {
    /// oEmbed metadata; absent when the metadata endpoint was unreachable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,
    pub transcript: Transcript,
}

/// Result of one item's trip through the fallback chain.
///
/// Per-video errors are captured here and never raised past the batch
/// boundary.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchResult {
    pub reference: VideoReference,
    pub status: FetchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<FetchPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl FetchResult {
    pub fn success(reference: VideoReference, payload: FetchPayload) -> Self {
        Self {
            reference,
            status: FetchStatus::Success,
            payload: Some(payload),
            error_detail: None,
        }
    }

    pub fn error(reference: VideoReference, detail: impl Into<String>) -> Self {
        Self {
            reference,
            status: FetchStatus::Error,
            payload: None,
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_usable(&self) -> bool {
        self.status == FetchStatus::Success && self.payload.is_some()
    }

    /// Video title, when metadata came back with the payload.
    pub fn title(&self) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.metadata.as_ref())
            .map(|m| m.title.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::resolve;

    #[test]
    fn test_transcript_full_text_joined() {
        let transcript = Transcript::from_segments(
            "dQw4w9WgXcQ",
            "en",
            true,
            vec![
                TranscriptSegment {
                    text: "welcome to".to_string(),
                    start: 0.0,
                    duration: 1.2,
                },
                TranscriptSegment {
                    text: "the city".to_string(),
                    start: 1.2,
                    duration: 0.9,
                },
            ],
        );

        assert_eq!(transcript.full_text, "welcome to the city");
        assert_eq!(transcript.segments.len(), 2);
    }

    #[test]
    fn test_attempt_summary_carries_route_and_latency() {
        let attempt = FetchAttempt {
            canonical_id: "dQw4w9WgXcQ".to_string(),
            mechanism: FetchMechanism::PooledProxy,
            proxy: Some("http://1.2.3.4:8080".to_string()),
            started_at: Utc::now(),
            latency: Duration::from_millis(240),
            error: Some("status 429".to_string()),
        };
        assert_eq!(
            attempt.summary(),
            "pooled_proxy via http://1.2.3.4:8080 after 240ms: status 429"
        );

        let direct = FetchAttempt {
            mechanism: FetchMechanism::Direct,
            proxy: None,
            error: None,
            ..attempt
        };
        assert_eq!(direct.summary(), "direct via - after 240ms: ok");
    }

    #[test]
    fn test_fetch_result_usability() {
        let reference = resolve("https://youtu.be/dQw4w9WgXcQ").unwrap();

        let ok = FetchResult::success(
            reference.clone(),
            FetchPayload {
                metadata: None,
                transcript: Transcript::from_segments("dQw4w9WgXcQ", "en", false, vec![]),
            },
        );
        assert!(ok.is_usable());
        assert!(ok.error_detail.is_none());

        let err = FetchResult::error(reference, "all mechanisms exhausted");
        assert!(!err.is_usable());
        assert_eq!(err.status, FetchStatus::Error);
    }
}
