use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub id: u64,
    pub request_id: u64,
    pub from_user_id: u64,
    pub to_user_id: u64,
    pub rating: u8,
    pub review_text: Option<String>,
    pub created_at: DateTime<Utc>,
}
