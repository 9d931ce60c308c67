use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::AppError;
use crate::models::territory::{Schedule, Territory, TerritoryStatus, Weekday};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/territories", post(create_territory).get(list_territories))
        .route("/territories/by-owner/:owner_id", get(list_territories_by_owner))
        .route("/territories/:id/assign", post(assign_territory))
}

#[derive(Deserialize)]
pub struct CreateTerritoryRequest {
    pub name: String,
    pub zip_codes: Vec<String>,
    pub price: Option<f64>,
    pub monthly_fee: Option<f64>,
    pub time_slot_days: Option<Vec<Weekday>>,
    pub time_slot_start: Option<String>,
    pub time_slot_end: Option<String>,
}

#[derive(Deserialize)]
pub struct AssignTerritoryRequest {
    pub user_id: u64,
}

/// Territory row joined with its owner's name and email, as the admin
/// listing shows it.
#[derive(Serialize)]
pub struct TerritoryWithOwner {
    #[serde(flatten)]
    pub territory: Territory,
    pub owner_name: Option<String>,
    pub owner_email: Option<String>,
}

fn parse_time_of_day(raw: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| AppError::Validation(format!("invalid time of day: {raw}")))
}

async fn create_territory(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTerritoryRequest>,
) -> Result<Json<Territory>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name is required".to_string()));
    }

    let zip_codes: Vec<String> = payload
        .zip_codes
        .iter()
        .map(|z| z.trim().to_string())
        .filter(|z| !z.is_empty())
        .collect();
    if zip_codes.is_empty() {
        return Err(AppError::Validation(
            "at least one zip code is required".to_string(),
        ));
    }

    // Omitted slot fields default to always-on-duty.
    let defaults = Schedule::always();
    let schedule = Schedule {
        days: payload.time_slot_days.unwrap_or(defaults.days),
        start: match payload.time_slot_start.as_deref() {
            Some(raw) => parse_time_of_day(raw)?,
            None => defaults.start,
        },
        end: match payload.time_slot_end.as_deref() {
            Some(raw) => parse_time_of_day(raw)?,
            None => defaults.end,
        },
    };

    let territory = Territory {
        id: state.territory_ids.next(),
        name: payload.name,
        zip_codes,
        price: payload.price,
        monthly_fee: payload.monthly_fee,
        status: TerritoryStatus::Available,
        owner_id: None,
        schedule,
        created_at: state.clock.now(),
        assigned_at: None,
    };

    state.territories.insert(territory.id, territory.clone());
    info!(territory_id = territory.id, name = %territory.name, "territory created");

    Ok(Json(territory))
}

async fn list_territories(State(state): State<Arc<AppState>>) -> Json<Vec<TerritoryWithOwner>> {
    let mut territories: Vec<Territory> = state
        .territories
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    territories.sort_by(|a, b| {
        a.status
            .rank()
            .cmp(&b.status.rank())
            .then_with(|| a.name.cmp(&b.name))
    });

    let rows = territories
        .into_iter()
        .map(|territory| {
            let owner = territory
                .owner_id
                .and_then(|id| state.users.get(&id).map(|u| u.value().clone()));
            TerritoryWithOwner {
                owner_name: owner.as_ref().map(|u| u.full_name.clone()),
                owner_email: owner.map(|u| u.email),
                territory,
            }
        })
        .collect();

    Json(rows)
}

async fn list_territories_by_owner(
    State(state): State<Arc<AppState>>,
    Path(owner_id): Path<u64>,
) -> Json<Vec<Territory>> {
    let mut territories: Vec<Territory> = state
        .territories
        .iter()
        .filter(|entry| entry.value().owner_id == Some(owner_id))
        .map(|entry| entry.value().clone())
        .collect();
    territories.sort_by_key(|t| t.id);

    Json(territories)
}

async fn assign_territory(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
    Json(payload): Json<AssignTerritoryRequest>,
) -> Result<Json<Territory>, AppError> {
    if !state.users.contains_key(&payload.user_id) {
        return Err(AppError::NotFound(format!(
            "user {} not found",
            payload.user_id
        )));
    }

    let updated = {
        let mut territory = state
            .territories
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("territory {id} not found")))?;

        territory.status = TerritoryStatus::Sold;
        territory.owner_id = Some(payload.user_id);
        territory.assigned_at = Some(state.clock.now());
        territory.clone()
    };

    state.log_activity(
        Some(payload.user_id),
        "territory_assigned",
        "territory",
        id,
        Value::Null,
    );
    info!(territory_id = id, owner_id = payload.user_id, "territory assigned");

    Ok(Json(updated))
}
