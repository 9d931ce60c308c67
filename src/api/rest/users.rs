use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::error::AppError;
use crate::models::user::{User, UserRole, UserStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id/status", patch(update_user_status))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub phone: Option<String>,
    pub status: Option<UserStatus>,
    pub avatar_url: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: UserStatus,
}

/// Idempotent by email: signing up with a known address returns the existing
/// row instead of creating a duplicate.
async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.email.trim().is_empty() || payload.full_name.trim().is_empty() {
        return Err(AppError::Validation(
            "email and full_name are required".to_string(),
        ));
    }

    if let Some(existing) = state
        .users
        .iter()
        .find(|entry| entry.value().email == payload.email)
    {
        return Ok(Json(existing.value().clone()));
    }

    let user = User {
        id: state.user_ids.next(),
        email: payload.email,
        full_name: payload.full_name,
        phone: payload.phone,
        role: payload.role,
        status: payload.status.unwrap_or(UserStatus::Active),
        avatar_url: payload.avatar_url,
        created_at: state.clock.now(),
    };

    state.users.insert(user.id, user.clone());
    info!(user_id = user.id, role = ?user.role, "user created");

    Ok(Json(user))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    let mut users: Vec<User> = state
        .users
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    users.sort_by(|a, b| {
        a.role
            .rank()
            .cmp(&b.role.rank())
            .then_with(|| a.status.rank().cmp(&b.status.rank()))
            .then_with(|| b.created_at.cmp(&a.created_at))
            .then_with(|| b.id.cmp(&a.id))
    });

    Json(users)
}

async fn update_user_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<User>, AppError> {
    let updated = {
        let mut user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))?;

        user.status = payload.status;
        user.clone()
    };

    state.log_activity(
        Some(id),
        "status_changed",
        "user",
        id,
        json!({ "new_status": payload.status }),
    );

    Ok(Json(updated))
}
