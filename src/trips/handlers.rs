use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::jwt::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::trips::dto::{CreateTripRequest, TripData, TripDeleted, TripList, UpdateTripRequest};
use crate::trips::repo::Trip;

pub fn trip_routes() -> Router<AppState> {
    Router::new()
        .route("/trips", get(list_trips).post(create_trip))
        .route(
            "/trips/:id",
            get(get_trip).put(update_trip).delete(delete_trip),
        )
        .route("/trips/:id/expenses", post(add_expense))
        .route("/trips/:id/photos", post(add_photo))
}

#[instrument(skip(state))]
pub async fn list_trips(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TripList>, ApiError> {
    let trips = Trip::list_by_user(&state.db, user_id).await?;
    Ok(Json(TripList {
        success: true,
        count: trips.len(),
        data: trips,
    }))
}

#[instrument(skip(state, payload))]
pub async fn create_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<CreateTripRequest>,
) -> Result<(StatusCode, Json<TripData>), ApiError> {
    let new_trip = payload.into_new_trip().map_err(ApiError::bad_request)?;
    let trip = Trip::create(&state.db, user_id, &new_trip).await?;
    info!(trip_id = %trip.id, %user_id, days = trip.duration_days(), "trip created");
    Ok((
        StatusCode::CREATED,
        Json(TripData {
            success: true,
            data: trip,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn get_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TripData>, ApiError> {
    let trip = Trip::find_by_owner(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))?;
    Ok(Json(TripData {
        success: true,
        data: trip,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTripRequest>,
) -> Result<Json<TripData>, ApiError> {
    let mut trip = Trip::find_by_owner(&state.db, id, user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))?;

    payload.apply(&mut trip).map_err(ApiError::bad_request)?;
    let updated = Trip::update(&state.db, &trip).await?;

    info!(trip_id = %id, %user_id, "trip updated");
    Ok(Json(TripData {
        success: true,
        data: updated,
    }))
}

#[instrument(skip(state))]
pub async fn delete_trip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TripDeleted>, ApiError> {
    if !Trip::delete(&state.db, id, user_id).await? {
        return Err(ApiError::not_found("Trip not found"));
    }
    info!(trip_id = %id, %user_id, "trip deleted");
    Ok(Json(TripDeleted {
        success: true,
        message: "Trip deleted".into(),
    }))
}

#[instrument(skip(state, entry))]
pub async fn add_expense(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(entry): Json<serde_json::Value>,
) -> Result<Json<TripData>, ApiError> {
    if !entry.is_object() {
        return Err(ApiError::bad_request("expense must be a JSON object"));
    }
    let trip = Trip::append_expense(&state.db, id, user_id, &entry)
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))?;
    Ok(Json(TripData {
        success: true,
        data: trip,
    }))
}

#[instrument(skip(state, entry))]
pub async fn add_photo(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(entry): Json<serde_json::Value>,
) -> Result<Json<TripData>, ApiError> {
    if !entry.is_object() {
        return Err(ApiError::bad_request("photo must be a JSON object"));
    }
    let trip = Trip::append_photo(&state.db, id, user_id, &entry)
        .await?
        .ok_or_else(|| ApiError::not_found("Trip not found"))?;
    Ok(Json(TripData {
        success: true,
        data: trip,
    }))
}
