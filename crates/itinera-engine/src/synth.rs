//! Content synthesizer: turns aggregated transcript analysis into an
//! itinerary.
//!
//! The pipeline talks to the [`Synthesizer`] trait; the Gemini
//! implementation prompts the model for a single JSON object and parses it
//! into the itinerary schema, tolerating markdown code fences around the
//! payload.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use itinera_models::{Itinerary, TranscriptAnalysis, TravelPreferences};

/// Synthesis errors, split by whether a retry can help.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Provider hiccup (network, 5xx, rate limit). Retryable.
    #[error("synthesis provider error: {0}")]
    Transient(String),

    /// The provider answered but the payload did not parse. Not retried
    /// beyond the configured budget.
    #[error("synthesis output unparseable: {0}")]
    Unparseable(String),

    #[error("synthesis misconfigured: {0}")]
    Config(String),
}

impl SynthesisError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SynthesisError::Transient(_))
    }
}

/// Generates an itinerary from aggregated video content.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(
        &self,
        analysis: &TranscriptAnalysis,
        preferences: &TravelPreferences,
    ) -> Result<Itinerary, SynthesisError>;
}

/// Gemini API request.
#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

/// Gemini-backed [`Synthesizer`].
pub struct GeminiSynthesizer {
    api_key: String,
    model: String,
    base_url: String,
    client: Client,
}

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

impl GeminiSynthesizer {
    /// Create a client from the environment (`GEMINI_API_KEY`,
    /// optional `GEMINI_MODEL`).
    pub fn from_env() -> Result<Self, SynthesisError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| SynthesisError::Config("GEMINI_API_KEY not set".to_string()))?;
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Ok(Self::new(api_key, model, DEFAULT_API_BASE))
    }

    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    /// Build the generation prompt.
    fn build_prompt(analysis: &TranscriptAnalysis, preferences: &TravelPreferences) -> String {
        let transcripts = analysis
            .transcripts
            .iter()
            .enumerate()
            .map(|(i, t)| {
                let title = analysis
                    .video_titles
                    .get(i)
                    .map(|t| t.as_str())
                    .unwrap_or("untitled");
                format!("--- VIDEO {} ({title}) ---\n{t}", i + 1)
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let notes = preferences.additional_notes.as_deref().unwrap_or("none");
        let must_visit = if preferences.must_visit_places.is_empty() {
            "none".to_string()
        } else {
            preferences.must_visit_places.join(", ")
        };
        let dietary = if preferences.dietary_restrictions.is_empty() {
            "none".to_string()
        } else {
            preferences.dietary_restrictions.join(", ")
        };

        format!(
            r#"You are an expert travel planner. Identify the destination from the transcripts below, then build a day-by-day itinerary grounded ONLY in the places, activities and tips they mention.

TRAVELER PREFERENCES:
- Budget: {budget} {currency} total for {travelers} traveler(s)
- Duration: {days} day(s)
- Trip type: {trip_type:?}
- Activity style: {style:?}
- Accommodation: {tier:?}
- Dietary restrictions: {dietary}
- Must-visit places: {must_visit}
- Notes: {notes}

TRANSCRIPTS:
{transcripts}

IMPORTANT: Return ONLY a single JSON object and nothing else, with this shape:
{{
  "title": "...",
  "destination": "...",
  "country": "...",
  "summary": "...",
  "days": [
    {{
      "day_number": 1,
      "theme": "...",
      "summary": "...",
      "activities": [
        {{"time_slot": "09:00 - 11:00", "place_name": "...", "description": "...", "estimated_cost": 0.0, "estimated_duration": "2h", "tips": [], "warnings": [], "booking_required": false}}
      ],
      "meals": [
        {{"meal_type": "lunch", "place_name": "...", "estimated_cost": 0.0}}
      ],
      "total_estimated_cost": 0.0
    }}
  ],
  "total_budget_estimate": 0.0,
  "currency": "{currency}",
  "budget_breakdown": {{"accommodation": 0.0, "food": 0.0, "activities": 0.0, "transportation": 0.0, "shopping": 0.0, "miscellaneous": 0.0, "total": 0.0}},
  "general_tips": [],
  "packing_suggestions": [],
  "language_phrases": []
}}

Additional instructions:
- Stay within the stated budget.
- Honor dietary restrictions in every meal recommendation.
- Include every must-visit place on some day.
- Only recommend places that appear in the transcripts or are essential logistics (airport transfer, hotel area)."#,
            budget = preferences.budget,
            currency = preferences.currency,
            travelers = preferences.num_travelers,
            days = preferences.trip_duration_days,
            trip_type = preferences.trip_type,
            style = preferences.activity_style,
            tier = preferences.accommodation_preference,
            dietary = dietary,
            must_visit = must_visit,
            notes = notes,
            transcripts = transcripts,
        )
    }

    async fn call_api(&self, prompt: &str) -> Result<Itinerary, SynthesisError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SynthesisError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("provider returned {status}: {body}");
            return if status.is_server_error() || status.as_u16() == 429 {
                Err(SynthesisError::Transient(message))
            } else {
                Err(SynthesisError::Unparseable(message))
            };
        }

        let gemini_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| SynthesisError::Transient(format!("response did not parse: {e}")))?;

        let text = gemini_response
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| SynthesisError::Unparseable("no content in response".to_string()))?;

        parse_itinerary_json(text)
    }
}

/// Parse the model output, stripping markdown code fences if present.
fn parse_itinerary_json(text: &str) -> Result<Itinerary, SynthesisError> {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    let itinerary: Itinerary = serde_json::from_str(text.trim())
        .map_err(|e| SynthesisError::Unparseable(format!("itinerary JSON invalid: {e}")))?;

    if itinerary.destination.trim().is_empty() {
        return Err(SynthesisError::Unparseable(
            "itinerary missing destination".to_string(),
        ));
    }
    Ok(itinerary)
}

#[async_trait]
impl Synthesizer for GeminiSynthesizer {
    async fn synthesize(
        &self,
        analysis: &TranscriptAnalysis,
        preferences: &TravelPreferences,
    ) -> Result<Itinerary, SynthesisError> {
        let prompt = Self::build_prompt(analysis, preferences);
        debug!(
            videos = analysis.transcripts.len(),
            prompt_chars = prompt.len(),
            "Calling synthesis provider"
        );

        let itinerary = self.call_api(&prompt).await?;
        if itinerary.days.len() != preferences.trip_duration_days as usize {
            warn!(
                requested_days = preferences.trip_duration_days,
                generated_days = itinerary.days.len(),
                "Generated itinerary day count differs from request"
            );
        }
        Ok(itinerary)
    }
}
