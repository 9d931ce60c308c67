use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::engine::lifecycle::{self, NewRequest, PhotoKind};
use crate::error::AppError;
use crate::models::request::ErrandRequest;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/requests", post(create_request).get(list_requests))
        .route("/requests/:id", get(get_request))
        .route("/requests/by-owner/:owner_id", get(list_requests_by_owner))
        .route("/requests/:id/accept", post(accept_request))
        .route("/requests/:id/complete", post(complete_request))
        .route("/requests/:id/confirm-delivery", post(confirm_delivery))
        .route("/requests/:id/tip", post(add_tip))
        .route("/requests/:id/photo", post(attach_photo))
        .route("/requests/:id/schedule", post(schedule_request))
        .route("/requests/:id/route-order", post(set_route_order))
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub runner_id: u64,
}

#[derive(Deserialize)]
pub struct TipRequest {
    pub tip_amount: f64,
}

#[derive(Deserialize)]
pub struct PhotoRequest {
    pub photo_type: PhotoKind,
    pub url: String,
}

#[derive(Deserialize)]
pub struct ScheduleRequest {
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct RouteOrderRequest {
    pub route_order: u32,
}

async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NewRequest>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::create(&state, payload).map(Json)
}

async fn list_requests(State(state): State<Arc<AppState>>) -> Json<Vec<ErrandRequest>> {
    let mut requests: Vec<ErrandRequest> = state
        .requests
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    requests.sort_by_key(|r| (r.scheduled_or_created(), r.id));

    Json(requests)
}

async fn get_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ErrandRequest>, AppError> {
    let request = state
        .requests
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    Ok(Json(request.value().clone()))
}

/// Requests assigned to the owner directly plus requests routed into one of
/// the owner's territories. Open work sorts first, then by scheduled pickup.
async fn list_requests_by_owner(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<u64>,
) -> Json<Vec<ErrandRequest>> {
    let owned_territories: Vec<u64> = state
        .territories
        .iter()
        .filter(|entry| entry.value().owner_id == Some(owner_id))
        .map(|entry| entry.value().id)
        .collect();

    let mut requests: Vec<ErrandRequest> = state
        .requests
        .iter()
        .filter(|entry| {
            let request = entry.value();
            request.assigned_to == Some(owner_id)
                || request
                    .territory_id
                    .is_some_and(|tid| owned_territories.contains(&tid))
        })
        .map(|entry| entry.value().clone())
        .collect();
    requests.sort_by_key(|r| (r.status.rank(), r.pickup_or_created(), r.id));

    Json(requests)
}

async fn accept_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::accept(&state, id, payload.runner_id).map(Json)
}

async fn complete_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::complete(&state, id).map(Json)
}

async fn confirm_delivery(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::confirm_delivery(&state, id).map(Json)
}

async fn add_tip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<TipRequest>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::add_tip(&state, id, payload.tip_amount).map(Json)
}

async fn attach_photo(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<PhotoRequest>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::attach_photo(&state, id, payload.photo_type, payload.url).map(Json)
}

async fn schedule_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<ScheduleRequest>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::schedule(&state, id, payload.scheduled_time).map(Json)
}

async fn set_route_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<RouteOrderRequest>,
) -> Result<Json<ErrandRequest>, AppError> {
    lifecycle::set_route_order(&state, id, payload.route_order).map(Json)
}
