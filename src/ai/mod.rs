use axum::Router;

use crate::state::AppState;

pub mod client;
pub mod dto;
pub mod handlers;
pub mod request;
pub mod response;

pub fn router() -> Router<AppState> {
    handlers::ai_routes()
}
