use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Open,
    Accepted,
    Completed,
}

impl RequestStatus {
    /// Display rank used by owner listings: open work first.
    pub fn rank(&self) -> u8 {
        match self {
            RequestStatus::Open => 1,
            RequestStatus::Accepted => 2,
            RequestStatus::Completed => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flexibility {
    Asap,
    Flexible,
}

impl Default for Flexibility {
    fn default() -> Self {
        Flexibility::Flexible
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrandRequest {
    pub id: u64,
    pub title: String,
    pub description: Option<String>,
    pub pickup: String,
    pub dropoff: String,
    pub status: RequestStatus,
    pub created_by: Option<u64>,
    pub territory_id: Option<u64>,
    pub assigned_to: Option<u64>,
    pub accepted_by: Option<u64>,
    pub pickup_time: Option<DateTime<Utc>>,
    pub pickup_flexibility: Flexibility,
    pub delivery_time: Option<DateTime<Utc>>,
    pub delivery_flexibility: Flexibility,
    pub offered_amount: Option<f64>,
    pub tip_amount: Option<f64>,
    pub payment_method: Option<String>,
    pub payment_notes: Option<String>,
    pub receipt_photo_url: Option<String>,
    pub delivery_photo_url: Option<String>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub route_order: Option<u32>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub delivery_confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ErrandRequest {
    /// Sort key for request listings: scheduled time when set, creation time
    /// otherwise (mirrors `COALESCE(scheduled_time, created_at)`).
    pub fn scheduled_or_created(&self) -> DateTime<Utc> {
        self.scheduled_time.unwrap_or(self.created_at)
    }

    /// Sort key for owner work queues: pickup time when set, else creation.
    pub fn pickup_or_created(&self) -> DateTime<Utc> {
        self.pickup_time.unwrap_or(self.created_at)
    }
}
