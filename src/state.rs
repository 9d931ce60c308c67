use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::clock::Clock;
use crate::models::activity::ActivityLogEntry;
use crate::models::rating::Rating;
use crate::models::request::ErrandRequest;
use crate::models::territory::Territory;
use crate::models::user::User;
use crate::observability::metrics::Metrics;

/// Dense id allocator, one per entity map. Ids start at 1 and never repeat,
/// which gives listings and tie-breaks a stable insertion order.
pub struct IdGen(AtomicU64);

impl IdGen {
    fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

pub struct AppState {
    pub users: DashMap<u64, User>,
    pub territories: DashMap<u64, Territory>,
    pub requests: DashMap<u64, ErrandRequest>,
    pub ratings: DashMap<u64, Rating>,
    pub activity_log: DashMap<u64, ActivityLogEntry>,
    pub user_ids: IdGen,
    pub territory_ids: IdGen,
    pub request_ids: IdGen,
    pub rating_ids: IdGen,
    pub activity_ids: IdGen,
    pub activity_events_tx: broadcast::Sender<ActivityLogEntry>,
    pub clock: Arc<dyn Clock>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(event_buffer_size: usize, clock: Arc<dyn Clock>) -> Self {
        let (activity_events_tx, _unused_rx) = broadcast::channel(event_buffer_size);

        Self {
            users: DashMap::new(),
            territories: DashMap::new(),
            requests: DashMap::new(),
            ratings: DashMap::new(),
            activity_log: DashMap::new(),
            user_ids: IdGen::new(),
            territory_ids: IdGen::new(),
            request_ids: IdGen::new(),
            rating_ids: IdGen::new(),
            activity_ids: IdGen::new(),
            activity_events_tx,
            clock,
            metrics: Metrics::new(),
        }
    }

    /// Append an audit entry and fan it out to websocket subscribers.
    pub fn log_activity(
        &self,
        user_id: Option<u64>,
        action: &str,
        entity_type: &str,
        entity_id: u64,
        details: serde_json::Value,
    ) -> ActivityLogEntry {
        let entry = ActivityLogEntry {
            id: self.activity_ids.next(),
            user_id,
            action: action.to_string(),
            entity_type: entity_type.to_string(),
            entity_id,
            details,
            created_at: self.clock.now(),
        };

        self.activity_log.insert(entry.id, entry.clone());
        let _ = self.activity_events_tx.send(entry.clone());
        entry
    }
}
