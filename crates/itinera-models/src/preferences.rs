//! Traveler preference schema used in itinerary generation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Type of trip based on who is traveling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    Family,
    Friends,
    #[default]
    Solo,
    Couple,
}

/// Preferred activity style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStyle {
    Sporty,
    Relaxing,
    #[default]
    Mixed,
    Adventure,
    Cultural,
}

/// Preferred accommodation level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccommodationTier {
    Budget,
    #[default]
    MidRange,
    Luxury,
}

/// Traveler preferences supplied at job submission.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct TravelPreferences {
    /// Total budget for the trip
    #[validate(range(exclusive_min = 0.0))]
    pub budget: f64,

    /// Currency code (e.g. USD, EUR, INR)
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub trip_type: TripType,

    #[serde(default)]
    pub activity_style: ActivityStyle,

    /// Number of travelers
    #[validate(range(min = 1, max = 50))]
    pub num_travelers: u32,

    /// Duration of the trip in days
    #[validate(range(min = 1, max = 30))]
    pub trip_duration_days: u32,

    /// Dietary restrictions (e.g. vegetarian, vegan, halal)
    #[serde(default)]
    pub dietary_restrictions: Vec<String>,

    /// Mobility or accessibility requirements
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobility_constraints: Option<String>,

    /// Places that must be included in the itinerary
    #[serde(default)]
    pub must_visit_places: Vec<String>,

    #[serde(default)]
    pub accommodation_preference: AccommodationTier,

    /// Trip start date in YYYY-MM-DD format, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,

    /// Free-form notes
    #[validate(length(max = 1000))]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_notes: Option<String>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for TravelPreferences {
    fn default() -> Self {
        Self {
            budget: 1000.0,
            currency: default_currency(),
            trip_type: TripType::default(),
            activity_style: ActivityStyle::default(),
            num_travelers: 1,
            trip_duration_days: 3,
            dietary_restrictions: Vec::new(),
            mobility_constraints: None,
            must_visit_places: Vec::new(),
            accommodation_preference: AccommodationTier::default(),
            start_date: None,
            additional_notes: None,
        }
    }
}
