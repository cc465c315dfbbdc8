use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::SharedStore;
use crate::error::StoreError;

/// Default number of entries kept by the local store.
pub const DEFAULT_LOCAL_STORE_CAPACITY: usize = 10_000;

enum LocalValue {
    Bytes(Vec<u8>),
    Counter(u64),
}

struct LocalEntry {
    value: LocalValue,
    expires_at: Instant,
}

impl LocalEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-local store backed by a bounded LRU map with per-entry expiry.
///
/// Used when no shared store is configured. State is not shared between
/// gateway instances, so limits and caches become per-instance.
pub struct LocalStore {
    entries: Mutex<LruCache<String, LocalEntry>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOCAL_STORE_CAPACITY)
    }

    /// Create a store holding at most `capacity` entries (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.lock().await;
        entries.iter().filter(|(_, e)| !e.is_expired(now)).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for LocalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for LocalStore {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired(now) {
                return match &mut entry.value {
                    LocalValue::Counter(count) => {
                        *count += 1;
                        Ok(*count)
                    }
                    LocalValue::Bytes(_) => {
                        Err(StoreError::Codec(format!("value at '{}' is not a counter", key)))
                    }
                };
            }
        }

        entries.put(
            key.to_string(),
            LocalEntry {
                value: LocalValue::Counter(1),
                expires_at: now + ttl,
            },
        );
        Ok(1)
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;

        let expired = match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => {
                return Ok(Some(match &entry.value {
                    LocalValue::Bytes(bytes) => bytes.clone(),
                    LocalValue::Counter(count) => count.to_string().into_bytes(),
                }))
            }
        };

        if expired {
            entries.pop(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().await;
        entries.put(
            key.to_string(),
            LocalEntry {
                value: LocalValue::Bytes(value),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().await.pop(key);
        Ok(())
    }

    fn mode(&self) -> &'static str {
        "local"
    }
}
