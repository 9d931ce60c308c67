use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Append-only audit record. Entries are written by routing and by
/// status-change operations and are never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLogEntry {
    pub id: u64,
    pub user_id: Option<u64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: u64,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
