use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    TerritoryOwner,
    Customer,
}

impl UserRole {
    pub fn rank(&self) -> u8 {
        match self {
            UserRole::Admin => 1,
            UserRole::TerritoryOwner => 2,
            UserRole::Customer => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Active,
    Suspended,
}

impl UserStatus {
    pub fn rank(&self) -> u8 {
        match self {
            UserStatus::Pending => 1,
            UserStatus::Active => 2,
            UserStatus::Suspended => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}
