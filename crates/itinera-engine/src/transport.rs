//! Transcript transport: the HTTP seam of the fetch orchestrator.
//!
//! The orchestrator drives the fallback chain against the
//! [`TranscriptTransport`] trait; the HTTP implementation talks to the
//! video service (watch page, caption tracks, oEmbed) through an optional
//! proxy. Each attempt gets its own client so the proxy and user agent can
//! differ per attempt.

use std::time::Duration;

use async_trait::async_trait;
use rand::prelude::IndexedRandom;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use itinera_models::{FetchPayload, Transcript, TranscriptSegment, VideoMetadata};

/// Browser user agents rotated across attempts.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
];

/// Transport-level fetch errors.
///
/// `ContentUnavailable` is terminal for a video: no other mechanism can
/// produce a transcript that does not exist. Everything else is treated as
/// connectivity and keeps the fallback chain going.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Network(String),

    #[error("blocked by the video service: {0}")]
    Blocked(String),

    #[error("attempt timed out")]
    Timeout,

    #[error("no transcript: {0}")]
    ContentUnavailable(String),
}

impl TransportError {
    /// Whether this is a property of the video rather than the route.
    pub fn is_content_level(&self) -> bool {
        matches!(self, TransportError::ContentUnavailable(_))
    }
}

/// Fetches transcript content for one video through one route.
#[async_trait]
pub trait TranscriptTransport: Send + Sync {
    /// Fetch metadata and transcript for `video_id`, optionally through the
    /// given proxy URL.
    async fn fetch(
        &self,
        video_id: &str,
        proxy_url: Option<&str>,
    ) -> Result<FetchPayload, TransportError>;
}

/// Caption track entry embedded in the watch page player response.
#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
    /// "asr" marks auto-generated tracks
    #[serde(default)]
    kind: Option<String>,
}

/// json3 timed-text payload.
#[derive(Debug, Deserialize)]
struct TimedText {
    #[serde(default)]
    events: Vec<TimedTextEvent>,
}

#[derive(Debug, Deserialize)]
struct TimedTextEvent {
    #[serde(rename = "tStartMs", default)]
    start_ms: u64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: u64,
    #[serde(default)]
    segs: Vec<TimedTextSeg>,
}

#[derive(Debug, Deserialize)]
struct TimedTextSeg {
    #[serde(rename = "utf8", default)]
    text: String,
}

/// HTTP implementation of [`TranscriptTransport`].
pub struct HttpTranscriptTransport {
    /// Watch page and oEmbed host, overridable for tests
    base_url: String,
    attempt_timeout: Duration,
    caption_tracks_re: Regex,
}

/// Video service origin.
const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

impl HttpTranscriptTransport {
    pub fn new(attempt_timeout: Duration) -> Self {
        Self::with_base_url(attempt_timeout, DEFAULT_BASE_URL)
    }

    /// Point the transport at a different origin (used by tests).
    pub fn with_base_url(attempt_timeout: Duration, base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            attempt_timeout,
            // The player response is inlined into the watch page; the track
            // list is the only piece we need out of it.
            caption_tracks_re: Regex::new(r#""captionTracks":(\[.*?\])"#).unwrap(),
        }
    }

    /// Build a one-shot client for a single attempt.
    fn build_client(&self, proxy_url: Option<&str>) -> Result<reqwest::Client, TransportError> {
        let mut rng = rand::rng();
        let user_agent = USER_AGENTS
            .choose(&mut rng)
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut builder = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(self.attempt_timeout);
        if let Some(url) = proxy_url {
            let proxy = reqwest::Proxy::all(url)
                .map_err(|e| TransportError::Network(format!("bad proxy url {url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        builder
            .build()
            .map_err(|e| TransportError::Network(format!("client build failed: {e}")))
    }

    async fn get_text(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<String, TransportError> {
        let response = client.get(url).send().await.map_err(classify_reqwest)?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 403 {
            return Err(TransportError::Blocked(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(TransportError::Network(format!("status {status}")));
        }
        response.text().await.map_err(classify_reqwest)
    }

    /// Fetch oEmbed metadata. Failures are tolerated: the transcript is the
    /// payload that matters.
    async fn fetch_metadata(
        &self,
        client: &reqwest::Client,
        video_id: &str,
    ) -> Option<VideoMetadata> {
        #[derive(Deserialize)]
        struct OEmbed {
            title: String,
            author_name: String,
            author_url: String,
            thumbnail_url: Option<String>,
        }

        let url = format!(
            "{}/oembed?url={}/watch?v={}&format=json",
            self.base_url, self.base_url, video_id
        );
        let body = match self.get_text(client, &url).await {
            Ok(body) => body,
            Err(e) => {
                debug!(video_id, error = %e, "oEmbed metadata fetch failed");
                return None;
            }
        };
        let oembed: OEmbed = match serde_json::from_str(&body) {
            Ok(v) => v,
            Err(e) => {
                debug!(video_id, error = %e, "oEmbed payload did not parse");
                return None;
            }
        };
        Some(VideoMetadata {
            video_id: video_id.to_string(),
            title: oembed.title,
            author_name: oembed.author_name,
            author_url: oembed.author_url,
            thumbnail_url: oembed.thumbnail_url,
        })
    }

    /// Extract the caption track list from the watch page HTML.
    fn extract_tracks(&self, video_id: &str, page: &str) -> Result<Vec<CaptionTrack>, TransportError> {
        if let Some(captures) = self.caption_tracks_re.captures(page) {
            let raw = captures.get(1).map(|m| m.as_str()).unwrap_or("[]");
            let tracks: Vec<CaptionTrack> = serde_json::from_str(raw)
                .map_err(|e| TransportError::Network(format!("caption track list did not parse: {e}")))?;
            if !tracks.is_empty() {
                return Ok(tracks);
            }
        }

        // No track list: decide whether the page is a block or the video
        // genuinely has nothing.
        if page.contains("recaptcha") || page.contains("unusual traffic") {
            return Err(TransportError::Blocked("challenge page served".to_string()));
        }
        if page.contains("\"playabilityStatus\"")
            && (page.contains("LOGIN_REQUIRED") || page.contains("UNPLAYABLE") || page.contains("ERROR"))
        {
            return Err(TransportError::ContentUnavailable(format!(
                "video {video_id} is private, removed or restricted"
            )));
        }
        Err(TransportError::ContentUnavailable(format!(
            "video {video_id} has no caption tracks"
        )))
    }

    /// Pick the track to fetch: prefer manually authored tracks, then
    /// English, then whatever is first.
    fn pick_track(tracks: &[CaptionTrack]) -> &CaptionTrack {
        tracks
            .iter()
            .find(|t| t.kind.as_deref() != Some("asr") && t.language_code.starts_with("en"))
            .or_else(|| tracks.iter().find(|t| t.kind.as_deref() != Some("asr")))
            .or_else(|| tracks.iter().find(|t| t.language_code.starts_with("en")))
            .unwrap_or(&tracks[0])
    }

    async fn fetch_track(
        &self,
        client: &reqwest::Client,
        video_id: &str,
        track: &CaptionTrack,
    ) -> Result<Transcript, TransportError> {
        let separator = if track.base_url.contains('?') { "&" } else { "?" };
        let url = if track.base_url.starts_with('/') {
            format!("{}{}{}fmt=json3", self.base_url, track.base_url, separator)
        } else {
            format!("{}{}fmt=json3", track.base_url, separator)
        };

        let body = self.get_text(client, &url).await?;
        let timed_text: TimedText = serde_json::from_str(&body)
            .map_err(|e| TransportError::Network(format!("timed text did not parse: {e}")))?;

        let segments: Vec<TranscriptSegment> = timed_text
            .events
            .into_iter()
            .filter_map(|event| {
                let text = event
                    .segs
                    .iter()
                    .map(|s| s.text.as_str())
                    .collect::<String>()
                    .trim()
                    .to_string();
                if text.is_empty() {
                    return None;
                }
                Some(TranscriptSegment {
                    text,
                    start: event.start_ms as f64 / 1000.0,
                    duration: event.duration_ms as f64 / 1000.0,
                })
            })
            .collect();

        if segments.is_empty() {
            return Err(TransportError::ContentUnavailable(format!(
                "caption track for {video_id} is empty"
            )));
        }

        Ok(Transcript::from_segments(
            video_id,
            &track.language_code,
            track.kind.as_deref() == Some("asr"),
            segments,
        ))
    }
}

#[async_trait]
impl TranscriptTransport for HttpTranscriptTransport {
    async fn fetch(
        &self,
        video_id: &str,
        proxy_url: Option<&str>,
    ) -> Result<FetchPayload, TransportError> {
        let client = self.build_client(proxy_url)?;

        let watch_url = format!("{}/watch?v={}", self.base_url, video_id);
        let page = self.get_text(&client, &watch_url).await?;
        let tracks = self.extract_tracks(video_id, &page)?;
        let track = Self::pick_track(&tracks);
        debug!(
            video_id,
            language = %track.language_code,
            generated = track.kind.as_deref() == Some("asr"),
            "Selected caption track"
        );

        let transcript = self.fetch_track(&client, video_id, track).await?;
        let metadata = self.fetch_metadata(&client, video_id).await;
        if metadata.is_none() {
            warn!(video_id, "Proceeding without video metadata");
        }

        Ok(FetchPayload {
            metadata,
            transcript,
        })
    }
}

fn classify_reqwest(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Network(e.to_string())
    }
}
