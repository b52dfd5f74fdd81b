//! Structured itinerary output schema and the aggregated analysis input.
//!
//! These types form the contract with the content synthesizer: the pipeline
//! hands it a [`TranscriptAnalysis`] and receives an [`Itinerary`] back.
//! Fields default liberally so partially filled model output still parses.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Transcript content aggregated from all usable videos in a batch.
///
/// The synthesizer mines places, activities and tips out of the raw
/// transcripts itself, so this carries only what the fetch stage actually
/// produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct TranscriptAnalysis {
    /// Titles of the source videos that contributed content
    #[serde(default)]
    pub video_titles: Vec<String>,
    /// Timestamped transcript text per video, in submission order
    #[serde(default)]
    pub transcripts: Vec<String>,
}

/// A single activity in a day plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Activity {
    /// Time range, e.g. "09:00 - 11:00"
    #[serde(default)]
    pub time_slot: String,
    pub place_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_time_from_previous: Option<String>,
    /// Recommended transport (walk, taxi, metro, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_mode: Option<String>,
    #[serde(default)]
    pub tips: Vec<String>,
    /// Scam alerts or things to watch out for
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub booking_required: bool,
    /// Indoor alternative for bad weather
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_alternative: Option<String>,
}

/// A meal recommendation within a day plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct MealRecommendation {
    /// breakfast, lunch, dinner or snack
    pub meal_type: String,
    pub place_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    /// Estimated cost per person
    #[serde(default)]
    pub estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation_reason: Option<String>,
}

/// One day of the generated itinerary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DayPlan {
    pub day_number: u32,
    /// Actual date (YYYY-MM-DD) when a start date was given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Theme of the day, e.g. "Cultural Exploration"
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub meals: Vec<MealRecommendation>,
    #[serde(default)]
    pub total_estimated_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Budget breakdown by category.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct BudgetBreakdown {
    #[serde(default)]
    pub accommodation: f64,
    #[serde(default)]
    pub food: f64,
    #[serde(default)]
    pub activities: f64,
    #[serde(default)]
    pub transportation: f64,
    #[serde(default)]
    pub shopping: f64,
    #[serde(default)]
    pub miscellaneous: f64,
    #[serde(default)]
    pub total: f64,
}

/// Complete generated travel itinerary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Itinerary {
    #[serde(default)]
    pub title: String,
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub days: Vec<DayPlan>,
    #[serde(default)]
    pub total_budget_estimate: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub budget_breakdown: BudgetBreakdown,
    #[serde(default)]
    pub general_tips: Vec<String>,
    #[serde(default)]
    pub packing_suggestions: Vec<String>,
    #[serde(default)]
    pub emergency_contacts: Vec<String>,
    /// Useful local phrases
    #[serde(default)]
    pub language_phrases: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_time_to_visit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_info: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}
