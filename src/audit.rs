//! Append-only security event log.

use std::sync::Arc;

use chrono::Utc;
use teloxide::types::UserId;
use tracing::{error, warn};

use crate::store::{KeyValueStore, StoreError};

const EVENTS_KEY: &str = "security:events";

pub const INVALID_ID_FORMAT: &str = "Invalid ID format attempted";
pub const UNAUTHORIZED_KNOWLEDGE_UPDATE: &str = "Unauthorized knowledge update attempt";

pub struct SecurityLog {
    store: Arc<dyn KeyValueStore>,
}

impl SecurityLog {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Append `user_id|event|timestamp`. Failures are logged, never raised.
    pub async fn record(&self, user_id: UserId, event: &str) {
        warn!(user_id = user_id.0, "Security event: {event}");
        let entry = format!(
            "{}|{}|{}",
            user_id.0,
            event,
            Utc::now().format("%Y-%m-%dT%H:%M:%S%.6f")
        );
        if let Err(e) = self.store.list_push(EVENTS_KEY, entry).await {
            error!("Security log error: {e}");
        }
    }

    /// The newest `count` entries, newest first.
    pub async fn recent(&self, count: usize) -> Result<Vec<String>, StoreError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        self.store.list_range(EVENTS_KEY, 0, count as isize - 1).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_entries_are_pipe_delimited() {
        let log = SecurityLog::new(Arc::new(MemoryStore::new()));
        log.record(UserId(99), INVALID_ID_FORMAT).await;

        let events = log.recent(10).await.unwrap();
        assert_eq!(events.len(), 1);
        let parts: Vec<&str> = events[0].split('|').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "99");
        assert_eq!(parts[1], "Invalid ID format attempted");
        assert!(chrono::NaiveDateTime::parse_from_str(parts[2], "%Y-%m-%dT%H:%M:%S%.f").is_ok());
    }

    #[tokio::test]
    async fn test_log_is_append_only_newest_first() {
        let log = SecurityLog::new(Arc::new(MemoryStore::new()));
        log.record(UserId(1), INVALID_ID_FORMAT).await;
        log.record(UserId(2), UNAUTHORIZED_KNOWLEDGE_UPDATE).await;

        let events = log.recent(10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].starts_with("2|Unauthorized"));
        assert!(events[1].starts_with("1|Invalid"));
        assert_eq!(log.recent(1).await.unwrap().len(), 1);
        assert!(log.recent(0).await.unwrap().is_empty());
    }
}
