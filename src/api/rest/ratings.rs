use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;

use crate::engine::lifecycle::{self, NewRating};
use crate::error::AppError;
use crate::models::rating::Rating;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/ratings", post(create_rating))
}

async fn create_rating(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewRating>,
) -> Result<Json<Rating>, AppError> {
    lifecycle::rate(&state, payload).map(Json)
}
