use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body for itinerary generation.
#[derive(Debug, Deserialize)]
pub struct GenerateTripRequest {
    pub content: Option<String>,
    pub model: Option<String>,
}

/// Request body for free-form travel questions.
#[derive(Debug, Deserialize)]
pub struct AskQuestionRequest {
    pub query: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// Request body for destination recommendation.
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub preferences: Option<TravelPreferences>,
}

/// Structured traveler preferences used by the recommendation intent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TravelPreferences {
    pub travel_type: Vec<String>,
    pub budget: Option<String>,
    pub duration: Option<String>,
    pub season: Option<String>,
    pub interests: Vec<String>,
    pub other: Option<String>,
}

impl TravelPreferences {
    /// Render the preferences as the user message for the model.
    pub fn render(&self) -> String {
        fn or_any(value: &Option<String>) -> &str {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or("any")
        }

        let travel_type = if self.travel_type.is_empty() {
            "any".to_string()
        } else {
            self.travel_type.join(", ")
        };
        let interests = if self.interests.is_empty() {
            "none in particular".to_string()
        } else {
            self.interests.join(", ")
        };
        let other = self
            .other
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("none");

        format!(
            "Based on the following travel preferences, recommend 3-5 suitable \
             destinations and briefly explain each choice:\n\
             - Travel style: {travel_type}\n\
             - Budget: {budget}\n\
             - Duration: {duration}\n\
             - Season: {season}\n\
             - Interests: {interests}\n\
             - Other notes: {other}",
            budget = or_any(&self.budget),
            duration = or_any(&self.duration),
            season = or_any(&self.season),
        )
    }
}

/// Success envelope for the AI endpoints. `incomplete` only appears when a
/// truncated completion could not be repaired.
#[derive(Debug, Serialize)]
pub struct AiResponse {
    pub success: bool,
    pub data: Value,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub incomplete: bool,
}

impl AiResponse {
    pub fn complete(data: Value) -> Self {
        Self {
            success: true,
            data,
            incomplete: false,
        }
    }

    pub fn partial(raw: String) -> Self {
        Self {
            success: true,
            data: Value::String(raw),
            incomplete: true,
        }
    }
}
