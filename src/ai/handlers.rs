use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use tracing::instrument;

use crate::ai::client::AiError;
use crate::ai::dto::{AiResponse, AskQuestionRequest, GenerateTripRequest, RecommendRequest};
use crate::ai::request::ChatRequest;
use crate::ai::response::AiOutcome;
use crate::auth::jwt::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

pub fn ai_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/generate-trip", post(generate_trip))
        .route("/ai/ask-question", post(ask_question))
        .route("/ai/recommend-destinations", post(recommend_destinations))
}

/// Itinerary generation authenticates with a vendor API key carried in the
/// bearer slot (falling back to the configured key), not a user token.
#[instrument(skip(state, headers, payload))]
pub async fn generate_trip(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateTripRequest>,
) -> Result<Json<AiResponse>, ApiError> {
    let content = payload.content.as_deref().map(str::trim).unwrap_or_default();
    if content.is_empty() {
        return Err(ApiError::bad_request("content is required"));
    }

    let key_override = bearer_token(&headers);
    let model = state.ai.resolve_model(payload.model.as_deref());
    let request = ChatRequest::itinerary(content, &model);

    let outcome = state
        .ai
        .chat(&request, key_override)
        .await
        .map_err(map_ai_error)?;
    respond(outcome)
}

#[instrument(skip(state, payload))]
pub async fn ask_question(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(payload): Json<AskQuestionRequest>,
) -> Result<Json<AiResponse>, ApiError> {
    let query = payload.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(ApiError::bad_request("query is required"));
    }

    let model = state.ai.resolve_model(None);
    let request = ChatRequest::question(query, payload.context.as_deref(), &model);

    let outcome = state.ai.chat(&request, None).await.map_err(map_ai_error)?;
    respond(outcome)
}

#[instrument(skip(state, payload))]
pub async fn recommend_destinations(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Json(payload): Json<RecommendRequest>,
) -> Result<Json<AiResponse>, ApiError> {
    let Some(preferences) = payload.preferences else {
        return Err(ApiError::bad_request("preferences are required"));
    };

    let model = state.ai.resolve_model(None);
    let request = ChatRequest::recommendation(&preferences, &model);

    let outcome = state.ai.chat(&request, None).await.map_err(map_ai_error)?;
    respond(outcome)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn map_ai_error(err: AiError) -> ApiError {
    match err {
        AiError::MissingKey => ApiError::unauthorized(err.to_string()),
        AiError::Upstream { .. } => ApiError::Upstream(err.to_string()),
    }
}

fn respond(outcome: AiOutcome) -> Result<Json<AiResponse>, ApiError> {
    match outcome {
        AiOutcome::Success(data) => Ok(Json(AiResponse::complete(data))),
        AiOutcome::Partial(raw) => Ok(Json(AiResponse::partial(raw))),
        AiOutcome::Failure { kind, message } => {
            Err(ApiError::Upstream(format!("{kind}: {message}")))
        }
    }
}
