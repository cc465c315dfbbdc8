//! Read-through caches in front of the slow, authoritative sources.
//!
//! Both caches follow the same get-or-populate contract:
//!
//! 1. look the key up in the shared store; on a hit return it,
//! 2. otherwise call the fetcher (backing-store HEAD, or the directory),
//! 3. hand the fresh value back to the caller and populate the store in the
//!    background.
//!
//! The store is never a correctness dependency. Read failures count as
//! misses, write failures are logged and dropped, and fetcher errors
//! (including "object not found") are never cached.
//!
//! An invalidation also cancels background writes for values fetched before
//! it, so a hook cannot be undone by a populate that was still in flight.

mod entitlement;
mod metadata;

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::store::SharedStore;

pub use entitlement::{EntitlementCache, DEFAULT_ENTITLEMENT_CACHE_TTL};
pub use metadata::{MetadataCache, ObjectMetadata, DEFAULT_METADATA_CACHE_TTL};

/// Number of invalidation generation counters per cache. Keys share a
/// counter by hash; a collision only drops a populate.
const GENERATION_STRIPES: usize = 64;

type Generations = Arc<[AtomicU64; GENERATION_STRIPES]>;

fn stripe(storage_key: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    storage_key.hash(&mut hasher);
    (hasher.finish() % GENERATION_STRIPES as u64) as usize
}

/// A typed, namespaced view over a [`SharedStore`] with JSON-encoded values.
pub struct ReadThroughCache<V> {
    store: Arc<dyn SharedStore>,
    namespace: &'static str,
    ttl: Duration,
    generations: Generations,
    _value: PhantomData<fn() -> V>,
}

impl<V> ReadThroughCache<V>
where
    V: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(store: Arc<dyn SharedStore>, namespace: &'static str, ttl: Duration) -> Self {
        Self {
            store,
            namespace,
            ttl,
            generations: Arc::new(std::array::from_fn(|_| AtomicU64::new(0))),
            _value: PhantomData,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn generation(&self, storage_key: &str) -> u64 {
        self.generations[stripe(storage_key)].load(Ordering::SeqCst)
    }

    /// Look up a cached value. Store and decode errors read as a miss.
    pub async fn peek(&self, key: &str) -> Option<V> {
        match self.store.get(&self.storage_key(key)).await {
            Ok(Some(bytes)) => match serde_json::from_slice(&bytes) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(cache = self.namespace, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(cache = self.namespace, error = %e, "Cache read failed, treating as miss");
                None
            }
        }
    }

    /// Return the cached value, or fetch it and populate the cache.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: &str, fetcher: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        self.get_or_fetch_where(key, fetcher, |_| true).await
    }

    /// Like [`get_or_fetch`](Self::get_or_fetch), but only values accepted by
    /// `cacheable` are written back.
    pub async fn get_or_fetch_where<F, Fut, E, P>(
        &self,
        key: &str,
        fetcher: F,
        cacheable: P,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        P: FnOnce(&V) -> bool,
    {
        if let Some(value) = self.peek(key).await {
            debug!(cache = self.namespace, "cache hit");
            return Ok(value);
        }

        debug!(cache = self.namespace, "cache miss");
        let generation = self.generation(&self.storage_key(key));
        let value = fetcher().await?;

        if cacheable(&value) {
            self.populate(key, &value, generation);
        }

        Ok(value)
    }

    /// Write `value` in the background; the caller never waits on the store.
    ///
    /// The write is skipped, or rolled back, if the key was invalidated after
    /// `generation` was read.
    fn populate(&self, key: &str, value: &V, generation: u64) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(cache = self.namespace, error = %e, "Failed to encode cache entry");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let storage_key = self.storage_key(key);
        let ttl = self.ttl;
        let namespace = self.namespace;
        let generations = Arc::clone(&self.generations);

        tokio::spawn(async move {
            let counter = &generations[stripe(&storage_key)];
            if counter.load(Ordering::SeqCst) != generation {
                debug!(cache = namespace, "Skipping populate of invalidated entry");
                return;
            }

            if let Err(e) = store.set(&storage_key, bytes, ttl).await {
                warn!(cache = namespace, error = %e, "Cache populate failed");
                return;
            }

            // An invalidation raced the write
            if counter.load(Ordering::SeqCst) != generation {
                if let Err(e) = store.delete(&storage_key).await {
                    warn!(cache = namespace, error = %e, "Failed to roll back stale populate");
                }
            }
        });
    }

    /// Remove a cached value and cancel pending populates of older values.
    /// Failures are logged, not returned.
    pub async fn invalidate(&self, key: &str) {
        let storage_key = self.storage_key(key);
        self.generations[stripe(&storage_key)].fetch_add(1, Ordering::SeqCst);

        match self.store.delete(&storage_key).await {
            Ok(()) => debug!(cache = self.namespace, "cache entry invalidated"),
            Err(e) => warn!(cache = self.namespace, error = %e, "Cache invalidation failed"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
