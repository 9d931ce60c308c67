use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::engine::routing;
use crate::error::AppError;
use crate::models::rating::Rating;
use crate::models::request::{ErrandRequest, Flexibility, RequestStatus};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NewRequest {
    pub title: String,
    pub pickup: String,
    pub dropoff: String,
    pub description: Option<String>,
    pub created_by: Option<u64>,
    pub pickup_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pickup_flexibility: Flexibility,
    pub delivery_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivery_flexibility: Flexibility,
    pub offered_amount: Option<f64>,
    pub payment_method: Option<String>,
    pub payment_notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoKind {
    Receipt,
    Delivery,
}

#[derive(Debug, Deserialize)]
pub struct NewRating {
    pub request_id: u64,
    pub from_user_id: u64,
    pub to_user_id: u64,
    pub rating: u8,
    pub review_text: Option<String>,
}

/// Validate, route and store a new request. Routing runs synchronously so the
/// created row already carries its territory and assignee.
pub fn create(state: &AppState, input: NewRequest) -> Result<ErrandRequest, AppError> {
    if input.title.trim().is_empty() || input.pickup.trim().is_empty() || input.dropoff.trim().is_empty()
    {
        return Err(AppError::Validation(
            "title, pickup and dropoff are required".to_string(),
        ));
    }

    let start = Instant::now();
    let decision = routing::route(state, &input.dropoff, input.pickup_time);
    let outcome = decision.outcome.as_label();

    state
        .metrics
        .routing_latency_seconds
        .with_label_values(&[outcome])
        .observe(start.elapsed().as_secs_f64());
    state
        .metrics
        .routed_requests_total
        .with_label_values(&[outcome])
        .inc();

    let id = state.request_ids.next();
    let request = ErrandRequest {
        id,
        title: input.title,
        description: input.description,
        pickup: input.pickup,
        dropoff: input.dropoff,
        status: RequestStatus::Open,
        created_by: input.created_by,
        territory_id: decision.territory_id,
        assigned_to: decision.assigned_to,
        accepted_by: None,
        pickup_time: input.pickup_time,
        pickup_flexibility: input.pickup_flexibility,
        delivery_time: input.delivery_time,
        delivery_flexibility: input.delivery_flexibility,
        offered_amount: input.offered_amount,
        tip_amount: None,
        payment_method: input.payment_method,
        payment_notes: input.payment_notes,
        receipt_photo_url: None,
        delivery_photo_url: None,
        scheduled_time: None,
        route_order: None,
        accepted_at: None,
        delivery_confirmed_at: None,
        completed_at: None,
        created_at: state.clock.now(),
    };

    state.requests.insert(id, request.clone());
    state.metrics.open_requests.inc();

    if let (Some(territory_id), Some(zip)) = (decision.territory_id, decision.zip.as_deref()) {
        state.log_activity(
            request.created_by,
            "request_routed",
            "request",
            id,
            json!({ "territory_id": territory_id, "zip": zip }),
        );
    }

    info!(
        request_id = id,
        territory_id = ?request.territory_id,
        assigned_to = ?request.assigned_to,
        "request created"
    );

    Ok(request)
}

/// Claim an open request. The shard lock held by `get_mut` makes the status
/// check and the mutation a single atomic step, so concurrent accepts on the
/// same request resolve to exactly one winner.
pub fn accept(state: &AppState, id: u64, runner_id: u64) -> Result<ErrandRequest, AppError> {
    let mut request = state
        .requests
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    if request.status != RequestStatus::Open {
        return Err(AppError::Precondition(
            "request is no longer available".to_string(),
        ));
    }

    request.status = RequestStatus::Accepted;
    request.accepted_by = Some(runner_id);
    request.assigned_to = Some(runner_id);
    request.accepted_at = Some(state.clock.now());

    state.metrics.open_requests.dec();
    state
        .metrics
        .lifecycle_transitions_total
        .with_label_values(&["accept"])
        .inc();

    info!(request_id = id, runner_id, "request accepted");
    Ok(request.clone())
}

pub fn complete(state: &AppState, id: u64) -> Result<ErrandRequest, AppError> {
    let updated = {
        let mut request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

        match request.status {
            RequestStatus::Accepted => {}
            RequestStatus::Open => {
                return Err(AppError::Precondition(
                    "request has not been accepted".to_string(),
                ));
            }
            RequestStatus::Completed => {
                return Err(AppError::Precondition(
                    "request is already completed".to_string(),
                ));
            }
        }

        if request.delivery_photo_url.is_none() {
            return Err(AppError::Precondition("delivery photo required".to_string()));
        }

        request.status = RequestStatus::Completed;
        request.completed_at = Some(state.clock.now());
        request.clone()
    };

    state
        .metrics
        .lifecycle_transitions_total
        .with_label_values(&["complete"])
        .inc();
    state.log_activity(
        updated.accepted_by,
        "request_completed",
        "request",
        id,
        json!({}),
    );

    info!(request_id = id, "request completed");
    Ok(updated)
}

/// Customer-side acknowledgment. Only completed requests can be confirmed;
/// repeat calls keep the first confirmation timestamp.
pub fn confirm_delivery(state: &AppState, id: u64) -> Result<ErrandRequest, AppError> {
    let mut request = state
        .requests
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    if request.status != RequestStatus::Completed {
        return Err(AppError::Precondition(
            "request is not completed".to_string(),
        ));
    }

    if request.delivery_confirmed_at.is_none() {
        request.delivery_confirmed_at = Some(state.clock.now());
    }

    Ok(request.clone())
}

/// Record a tip exactly once, after completion.
pub fn add_tip(state: &AppState, id: u64, amount: f64) -> Result<ErrandRequest, AppError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(AppError::Validation(
            "tip_amount must be a positive number".to_string(),
        ));
    }

    let mut request = state
        .requests
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    if request.status != RequestStatus::Completed {
        return Err(AppError::Precondition(
            "request is not completed".to_string(),
        ));
    }

    if request.tip_amount.is_some() {
        return Err(AppError::Precondition("tip already recorded".to_string()));
    }

    request.tip_amount = Some(amount);
    Ok(request.clone())
}

pub fn attach_photo(
    state: &AppState,
    id: u64,
    kind: PhotoKind,
    url: String,
) -> Result<ErrandRequest, AppError> {
    if url.trim().is_empty() {
        return Err(AppError::Validation("photo url is required".to_string()));
    }

    let mut request = state
        .requests
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    match kind {
        PhotoKind::Receipt => request.receipt_photo_url = Some(url),
        PhotoKind::Delivery => request.delivery_photo_url = Some(url),
    }

    Ok(request.clone())
}

pub fn rate(state: &AppState, input: NewRating) -> Result<Rating, AppError> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::Validation(
            "rating must be between 1 and 5".to_string(),
        ));
    }

    if !state.requests.contains_key(&input.request_id) {
        return Err(AppError::NotFound(format!(
            "request {} not found",
            input.request_id
        )));
    }

    let rating = Rating {
        id: state.rating_ids.next(),
        request_id: input.request_id,
        from_user_id: input.from_user_id,
        to_user_id: input.to_user_id,
        rating: input.rating,
        review_text: input.review_text,
        created_at: state.clock.now(),
    };

    state.ratings.insert(rating.id, rating.clone());
    Ok(rating)
}

/// Owner route planning: pin a request to a concrete time slot.
pub fn schedule(
    state: &AppState,
    id: u64,
    scheduled_time: DateTime<Utc>,
) -> Result<ErrandRequest, AppError> {
    let mut request = state
        .requests
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    request.scheduled_time = Some(scheduled_time);
    Ok(request.clone())
}

/// Owner route planning: position within the day's stop list.
pub fn set_route_order(
    state: &AppState,
    id: u64,
    route_order: u32,
) -> Result<ErrandRequest, AppError> {
    let mut request = state
        .requests
        .get_mut(&id)
        .ok_or_else(|| AppError::NotFound(format!("request {id} not found")))?;

    request.route_order = Some(route_order);
    Ok(request.clone())
}
