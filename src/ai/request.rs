use serde::Serialize;
use serde_json::Value;

use crate::ai::dto::TravelPreferences;

/// Upper bound on user content forwarded to the model.
pub const MAX_PROMPT_CHARS: usize = 10_000;
/// Completion budget per request.
pub const MAX_COMPLETION_TOKENS: u32 = 2_000;

/// What the caller wants from the model. Each intent fixes the system
/// instruction, the sampling temperature and the expected output shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Itinerary,
    Question,
    Recommendation,
}

impl Intent {
    pub fn system_prompt(self) -> &'static str {
        match self {
            Intent::Itinerary => {
                "You are a professional travel planner. Respond strictly as a JSON \
                 object containing the itinerary and a budget breakdown."
            }
            Intent::Question => {
                "You are a professional travel planning assistant. Provide detailed, \
                 practical travel advice for the user's needs."
            }
            Intent::Recommendation => {
                "You are an expert in recommending travel destinations. Suggest \
                 destinations that match the user's preferences and needs."
            }
        }
    }

    pub fn temperature(self) -> f32 {
        match self {
            Intent::Itinerary => 0.5,
            Intent::Question => 0.7,
            Intent::Recommendation => 0.8,
        }
    }

    fn wants_json(self) -> bool {
        matches!(self, Intent::Itinerary)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// OpenAI-style chat completion payload. Building one is a pure transform;
/// the caller has already rejected empty input.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    pub stream: bool,
}

impl ChatRequest {
    pub fn itinerary(content: &str, model: &str) -> Self {
        Self::build(Intent::Itinerary, content.trim().to_string(), model)
    }

    pub fn question(query: &str, context: Option<&str>, model: &str) -> Self {
        let content = match context.map(str::trim).filter(|c| !c.is_empty()) {
            Some(context) => format!("{context}\n\nNew question from the traveler: {query}"),
            None => format!("Please answer the following travel question:\n{query}"),
        };
        Self::build(Intent::Question, content, model)
    }

    pub fn recommendation(preferences: &TravelPreferences, model: &str) -> Self {
        Self::build(Intent::Recommendation, preferences.render(), model)
    }

    fn build(intent: Intent, user_content: String, model: &str) -> Self {
        Self {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: intent.system_prompt().to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: truncate_chars(&user_content, MAX_PROMPT_CHARS),
                },
            ],
            temperature: intent.temperature(),
            max_tokens: MAX_COMPLETION_TOKENS,
            response_format: intent
                .wants_json()
                .then(|| serde_json::json!({ "type": "json_object" })),
            stream: false,
        }
    }
}

/// Char-boundary-safe truncation to at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}
