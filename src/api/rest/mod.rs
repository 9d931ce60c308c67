pub mod ratings;
pub mod requests;
pub mod territories;
pub mod users;
pub mod ws;

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Serialize;
use tower_http::services::ServeDir;

use crate::models::activity::ActivityLogEntry;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(users::router())
        .merge(territories::router())
        .merge(requests::router())
        .merge(ratings::router())
        .route("/activity", get(list_activity))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
        .fallback_service(ServeDir::new("static"))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    users: usize,
    territories: usize,
    requests: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        users: state.users.len(),
        territories: state.territories.len(),
        requests: state.requests.len(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}

async fn list_activity(State(state): State<Arc<AppState>>) -> Json<Vec<ActivityLogEntry>> {
    let mut entries: Vec<ActivityLogEntry> = state
        .activity_log
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    entries.sort_by(|a, b| b.id.cmp(&a.id));

    Json(entries)
}
