//! Fixed-window per-user message limit.

use std::sync::Arc;
use std::time::Duration;

use teloxide::types::UserId;
use tracing::{error, warn};

use crate::store::KeyValueStore;

/// Length of the counting window, measured from the first message in it.
pub const WINDOW: Duration = Duration::from_secs(60);

/// What a guard answers when its backing service fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailMode {
    /// Let the request through.
    Open,
    /// Refuse the request.
    Closed,
}

impl FailMode {
    /// The "allowed" answer under this mode when the check itself failed.
    pub fn allows(self) -> bool {
        matches!(self, FailMode::Open)
    }
}

pub struct RateLimiter {
    store: Arc<dyn KeyValueStore>,
    limit: u32,
    on_error: FailMode,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, limit: u32) -> Self {
        Self {
            store,
            limit,
            on_error: FailMode::Closed,
        }
    }

    /// Count this message and report whether it is within the limit.
    pub async fn check(&self, user_id: UserId) -> bool {
        let key = format!("rate_limit:{}", user_id.0);
        match self.store.incr_in_window(&key, WINDOW).await {
            Ok(count) => {
                let allowed = count <= i64::from(self.limit);
                if !allowed {
                    warn!(user_id = user_id.0, count, "Rate limit exceeded");
                }
                allowed
            }
            Err(e) => {
                error!(user_id = user_id.0, "Rate limit check error: {e}");
                self.on_error.allows()
            }
        }
    }
}
