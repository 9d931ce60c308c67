use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveTime, Utc};
use regex::Regex;
use tracing::info;

use crate::engine::window;
use crate::models::territory::{TerritoryStatus, Weekday};
use crate::models::user::UserRole;
use crate::state::AppState;

static ZIP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}\b").expect("valid zip pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// A sold territory was on duty for the destination zip.
    Matched,
    /// No territory matched; the request went to the default admin.
    Fallback,
    /// No territory matched and no admin exists.
    Unassigned,
}

impl RoutingOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            RoutingOutcome::Matched => "matched",
            RoutingOutcome::Fallback => "fallback",
            RoutingOutcome::Unassigned => "unassigned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub territory_id: Option<u64>,
    pub assigned_to: Option<u64>,
    pub zip: Option<String>,
    pub outcome: RoutingOutcome,
}

/// First standalone 5-digit run in an address, if any.
pub fn extract_zip(address: &str) -> Option<&str> {
    ZIP_PATTERN.find(address).map(|m| m.as_str())
}

/// Select the territory on duty for a new request's destination and target
/// time. The target instant is the pickup time when given; asap and flexible
/// requests are evaluated against the injected clock's now. Ties between
/// matching territories go to the lowest id; a missing or malformed zip is
/// treated as "no match", not an error.
pub fn route(
    state: &AppState,
    dropoff: &str,
    pickup_time: Option<DateTime<Utc>>,
) -> RoutingDecision {
    let target = pickup_time.unwrap_or_else(|| state.clock.now());
    let day: Weekday = target.weekday().into();
    let time: NaiveTime = target.time();

    let zip = extract_zip(dropoff);

    let matched = zip.and_then(|zip| {
        state
            .territories
            .iter()
            .filter(|entry| {
                let territory = entry.value();
                territory.status == TerritoryStatus::Sold
                    && territory.zip_codes.iter().any(|z| z == zip)
                    && window::covers(&territory.schedule, day, time)
            })
            .map(|entry| (entry.value().id, entry.value().owner_id))
            .min_by_key(|(id, _)| *id)
    });

    if let Some((territory_id, Some(owner_id))) = matched {
        info!(
            territory_id,
            owner_id,
            zip = zip.unwrap_or_default(),
            "request matched to on-duty territory"
        );
        return RoutingDecision {
            territory_id: Some(territory_id),
            assigned_to: Some(owner_id),
            zip: zip.map(str::to_string),
            outcome: RoutingOutcome::Matched,
        };
    }

    let admin = state
        .users
        .iter()
        .filter(|entry| entry.value().role == UserRole::Admin)
        .map(|entry| entry.value().id)
        .min();

    match admin {
        Some(admin_id) => {
            info!(admin_id, "no territory on duty; routing to default admin");
            RoutingDecision {
                territory_id: None,
                assigned_to: Some(admin_id),
                zip: zip.map(str::to_string),
                outcome: RoutingOutcome::Fallback,
            }
        }
        None => RoutingDecision {
            territory_id: None,
            assigned_to: None,
            zip: zip.map(str::to_string),
            outcome: RoutingOutcome::Unassigned,
        },
    }
}
