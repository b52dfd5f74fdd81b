//! Video reference resolution.
//!
//! Parses user-pasted YouTube URLs into canonical video identifiers.
//! URLs are treated as untrusted input: only YouTube hosts are accepted
//! and video ids are strictly validated (11 chars, alphanumeric + `-_`).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Length of a YouTube video id.
const VIDEO_ID_LEN: usize = 11;

/// Errors produced while resolving a raw URL into a [`VideoReference`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReference {
    #[error("not a recognized video URL: {0}")]
    UnrecognizedHost(String),

    #[error("video id has invalid format (must be 11 characters of [A-Za-z0-9_-])")]
    MalformedId,

    #[error("no video id found in URL: {0}")]
    IdNotFound(String),
}

/// Which URL variant a reference was resolved from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum UrlShape {
    /// `youtube.com/watch?v=ID` (or any YouTube URL carrying a `v=` parameter)
    Watch,
    /// `youtu.be/ID`
    Short,
    /// `youtube.com/embed/ID`
    Embed,
    /// `youtube.com/shorts/ID`
    Shorts,
    /// `youtube.com/v/ID`
    Legacy,
}

impl std::fmt::Display for UrlShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UrlShape::Watch => "watch",
            UrlShape::Short => "short",
            UrlShape::Embed => "embed",
            UrlShape::Shorts => "shorts",
            UrlShape::Legacy => "legacy",
        };
        write!(f, "{s}")
    }
}

/// A validated reference to an externally hosted video.
///
/// `canonical_id` is deterministic from `raw_url`; the struct is immutable
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct VideoReference {
    /// Raw user-supplied URL (untrusted, kept for reporting)
    pub raw_url: String,
    /// Normalized 11-character video id
    pub canonical_id: String,
    /// URL variant the id was extracted from
    pub shape: UrlShape,
}

impl VideoReference {
    /// Canonical watch URL for this reference.
    pub fn canonical_watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.canonical_id)
    }
}

impl std::fmt::Display for VideoReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical_id)
    }
}

/// Resolve a raw URL into a [`VideoReference`].
///
/// Accepted shapes (case-insensitive, extraneous query parameters ignored):
/// watch (`?v=`), short (`youtu.be/`), embed (`/embed/`), shorts
/// (`/shorts/`) and legacy (`/v/`). An explicit id-bearing `v=` query
/// parameter wins over path-segment extraction when both are present.
pub fn resolve(raw_url: &str) -> Result<VideoReference, InvalidReference> {
    let trimmed = raw_url.trim();

    let parsed = parse_lenient(trimmed)
        .ok_or_else(|| InvalidReference::UnrecognizedHost(trimmed.to_string()))?;

    let host = parsed
        .host_str()
        .ok_or_else(|| InvalidReference::UnrecognizedHost(trimmed.to_string()))?
        .to_ascii_lowercase();

    if !is_youtube_host(&host) {
        return Err(InvalidReference::UnrecognizedHost(host));
    }

    // Explicit id-bearing query parameter takes priority over the path.
    if let Some(id) = parsed
        .query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case("v"))
        .map(|(_, v)| v.into_owned())
    {
        let canonical_id = validate_id(&id)?;
        return Ok(VideoReference {
            raw_url: trimmed.to_string(),
            canonical_id,
            shape: UrlShape::Watch,
        });
    }

    if let Some((id, shape)) = extract_from_path(&host, parsed.path()) {
        let canonical_id = validate_id(&id)?;
        return Ok(VideoReference {
            raw_url: trimmed.to_string(),
            canonical_id,
            shape,
        });
    }

    Err(InvalidReference::IdNotFound(trimmed.to_string()))
}

/// Parse a URL, tolerating a missing scheme (`youtube.com/watch?v=...`).
fn parse_lenient(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) if url.host_str().is_some() => Some(url),
        _ => Url::parse(&format!("https://{raw}"))
            .ok()
            .filter(|u| u.host_str().is_some()),
    }
}

fn is_youtube_host(host: &str) -> bool {
    matches!(
        host,
        "youtube.com"
            | "www.youtube.com"
            | "m.youtube.com"
            | "music.youtube.com"
            | "youtube-nocookie.com"
            | "www.youtube-nocookie.com"
            | "youtu.be"
    )
}

/// Extract an id-bearing path segment.
fn extract_from_path(host: &str, path: &str) -> Option<(String, UrlShape)> {
    let mut segments = path.split('/').filter(|s| !s.is_empty());

    if host == "youtu.be" {
        return segments.next().map(|id| (id.to_string(), UrlShape::Short));
    }

    let first = segments.next()?;
    let shape = match first.to_ascii_lowercase().as_str() {
        "embed" => UrlShape::Embed,
        "shorts" => UrlShape::Shorts,
        "v" => UrlShape::Legacy,
        _ => return None,
    };
    segments.next().map(|id| (id.to_string(), shape))
}

fn validate_id(id: &str) -> Result<String, InvalidReference> {
    let id = id.trim();
    if id.len() != VIDEO_ID_LEN {
        return Err(InvalidReference::MalformedId);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(InvalidReference::MalformedId);
    }
    Ok(id.to_string())
}
