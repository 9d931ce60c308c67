use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Mon,
            chrono::Weekday::Tue => Weekday::Tue,
            chrono::Weekday::Wed => Weekday::Wed,
            chrono::Weekday::Thu => Weekday::Thu,
            chrono::Weekday::Fri => Weekday::Fri,
            chrono::Weekday::Sat => Weekday::Sat,
            chrono::Weekday::Sun => Weekday::Sun,
        }
    }
}

/// Weekly operating window. `start` and `end` are wall-clock times; a window
/// with `start > end` wraps past midnight (e.g. 22:00-06:00).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub days: Vec<Weekday>,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl Schedule {
    pub fn always() -> Self {
        Self {
            days: Weekday::ALL.to_vec(),
            start: NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerritoryStatus {
    Available,
    Pending,
    Sold,
}

impl TerritoryStatus {
    /// Display rank used by territory listings: available first, sold last.
    pub fn rank(&self) -> u8 {
        match self {
            TerritoryStatus::Available => 1,
            TerritoryStatus::Pending => 2,
            TerritoryStatus::Sold => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Territory {
    pub id: u64,
    pub name: String,
    pub zip_codes: Vec<String>,
    pub price: Option<f64>,
    pub monthly_fee: Option<f64>,
    pub status: TerritoryStatus,
    pub owner_id: Option<u64>,
    pub schedule: Schedule,
    pub created_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
}
