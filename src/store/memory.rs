use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KeyValueStore, StoreError};

enum Value {
    Hash(HashMap<String, Vec<u8>>),
    Counter(i64),
    List(VecDeque<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| deadline > now)
    }
}

/// In-process store with the same expiry semantics as the Redis backend.
/// State is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the entry at `key` if it has expired, then return what remains.
    fn live<'a>(entries: &'a mut HashMap<String, Entry>, key: &str) -> Option<&'a mut Entry> {
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            None => Ok(HashMap::new()),
            Some(Entry { value: Value::Hash(fields), .. }) => Ok(fields.clone()),
            Some(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn hash_set_with_ttl(
        &self,
        key: &str,
        fields: Vec<(String, Vec<u8>)>,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut entries = self.entries.lock().await;
        let deadline = Instant::now() + ttl;
        match Self::live(&mut entries, key) {
            Some(Entry { value: Value::Hash(existing), expires_at }) => {
                existing.extend(fields);
                *expires_at = Some(deadline);
            }
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Hash(fields.into_iter().collect()),
                        expires_at: Some(deadline),
                    },
                );
            }
        }
        Ok(())
    }

    async fn incr_in_window(&self, key: &str, window: Duration) -> Result<i64, StoreError> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(Entry { value: Value::Counter(count), .. }) => {
                *count += 1;
                Ok(*count)
            }
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Counter(1),
                        expires_at: Some(Instant::now() + window),
                    },
                );
                Ok(1)
            }
        }
    }

    async fn list_push(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        match Self::live(&mut entries, key) {
            Some(Entry { value: Value::List(items), .. }) => {
                items.push_front(value);
                Ok(())
            }
            Some(_) => Err(StoreError::WrongType(key.to_string())),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::List(VecDeque::from([value])),
                        expires_at: None,
                    },
                );
                Ok(())
            }
        }
    }

    async fn list_range(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, StoreError> {
        let mut entries = self.entries.lock().await;
        let items = match Self::live(&mut entries, key) {
            None => return Ok(Vec::new()),
            Some(Entry { value: Value::List(items), .. }) => items,
            Some(_) => return Err(StoreError::WrongType(key.to_string())),
        };

        let len = items.len() as isize;
        let resolve = |i: isize| if i < 0 { len + i } else { i };
        let start = resolve(start).max(0);
        let stop = resolve(stop).min(len - 1);
        if start > stop {
            return Ok(Vec::new());
        }
        Ok(items
            .iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<bool, StoreError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_absent_hash_reads_empty() {
        let store = MemoryStore::new();
        assert!(store.hash_get_all("session:1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_hash_upsert_keeps_other_fields() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store
            .hash_set_with_ttl("h", vec![("a".into(), b"1".to_vec()), ("b".into(), b"2".to_vec())], ttl)
            .await
            .unwrap();
        store.hash_set_with_ttl("h", vec![("b".into(), b"3".to_vec())], ttl).await.unwrap();

        let fields = store.hash_get_all("h").await.unwrap();
        assert_eq!(fields.get("a").map(Vec::as_slice), Some(&b"1"[..]));
        assert_eq!(fields.get("b").map(Vec::as_slice), Some(&b"3"[..]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hash_ttl_refreshed_on_write() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(10);
        store.hash_set_with_ttl("h", vec![("a".into(), vec![1])], ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        store.hash_set_with_ttl("h", vec![("b".into(), vec![2])], ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(store.hash_get_all("h").await.unwrap().len(), 2);
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!(store.hash_get_all("h").await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_counter_window_is_fixed() {
        let store = MemoryStore::new();
        let window = Duration::from_secs(60);
        assert_eq!(store.incr_in_window("c", window).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(store.incr_in_window("c", window).await.unwrap(), 2);
        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.incr_in_window("c", window).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = MemoryStore::new();
        for v in ["one", "two", "three"] {
            store.list_push("l", v.to_string()).await.unwrap();
        }
        assert_eq!(store.list_range("l", 0, -1).await.unwrap(), vec!["three", "two", "one"]);
        assert_eq!(store.list_range("l", 0, 0).await.unwrap(), vec!["three"]);
        assert!(store.list_range("l", 5, 10).await.unwrap().is_empty());
        assert!(store.list_range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wrong_type_rejected() {
        let store = MemoryStore::new();
        store.list_push("k", "x".into()).await.unwrap();
        assert!(matches!(
            store.incr_in_window("k", Duration::from_secs(1)).await,
            Err(StoreError::WrongType(_))
        ));
    }
}
