//! Key-value store abstraction.
//!
//! Sessions, rate counters and the security log all live behind
//! [`KeyValueStore`]. Production uses [`RedisStore`]; [`MemoryStore`] backs
//! tests and single-process development (`REDIS_URL=memory://`).

mod memory;
mod redis_store;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// URL scheme that selects the in-process store.
pub const MEMORY_URL: &str = "memory://";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("key '{0}' holds a value of another type")]
    WrongType(String),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// All fields of a hash. An absent key reads as an empty map.
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError>;

    /// Upsert `fields` into a hash and reset the key's expiry to `ttl`,
    /// as one atomic step.
    async fn hash_set_with_ttl(
        &self,
        key: &str,
        fields: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Increment a counter. The expiry is set to `window` only when the
    /// increment creates the counter, so the window is fixed from the first hit.
    async fn incr_in_window(&self, key: &str, window: Duration) -> Result<i64, StoreError>;

    /// Prepend a value to a list.
    async fn list_push(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Inclusive range, newest first. Negative indexes count from the end.
    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError>;

    async fn ping(&self) -> Result<bool, StoreError>;
}

/// Connect to the store named by `url`.
pub async fn connect(url: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
    if url == MEMORY_URL {
        return Ok(Arc::new(MemoryStore::new()));
    }
    Ok(Arc::new(RedisStore::connect(url).await?))
}
