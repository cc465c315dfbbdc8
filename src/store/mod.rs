//! Shared key/value store behind the rate limiter and the caches.
//!
//! # Backends
//!
//! ```text
//! ┌──────────────────────────────┐
//! │    RateLimiter / caches      │
//! └──────────────┬───────────────┘
//!                │ Arc<dyn SharedStore>
//!                ▼
//! ┌──────────────────────────────┐
//! │         TimeoutStore         │  bounded wait per call
//! └──────────────┬───────────────┘
//!        ┌───────┴────────┐
//!        ▼                ▼
//! ┌─────────────┐  ┌─────────────┐
//! │ RedisStore  │  │ LocalStore  │
//! │ (shared)    │  │ (bounded    │
//! │             │  │  LRU map)   │
//! └─────────────┘  └─────────────┘
//! ```
//!
//! The backend is chosen once at startup and injected; there is no global
//! fallback instance.

mod local;
mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use local::{LocalStore, DEFAULT_LOCAL_STORE_CAPACITY};
pub use redis_store::RedisStore;

/// Default bound on a single store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

/// Minimal store contract shared by all gateway instances.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Atomically increment the counter at `key`, returning the new value.
    ///
    /// The expiry is set only when the counter is created by this call.
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Short label for logs and the health endpoint.
    fn mode(&self) -> &'static str;
}

/// Wraps a store so that no call waits longer than `timeout`.
pub struct TimeoutStore<S> {
    inner: S,
    timeout: Duration,
}

impl<S: SharedStore> TimeoutStore<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    async fn bounded<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait]
impl<S: SharedStore> SharedStore for TimeoutStore<S> {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        self.bounded(self.inner.incr_with_expiry(key, ttl)).await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.bounded(self.inner.get(key)).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), StoreError> {
        self.bounded(self.inner.set(key, value, ttl)).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.bounded(self.inner.delete(key)).await
    }

    fn mode(&self) -> &'static str {
        self.inner.mode()
    }
}

/// Build the store selected by configuration.
///
/// With a URL, connects a Redis pool and checks that a connection can be
/// obtained; an unreachable store at startup is an error. Without one, a
/// process-local bounded map is used.
pub async fn connect_store(
    redis_url: Option<&str>,
    local_capacity: usize,
    pool_size: usize,
    timeout: Duration,
) -> Result<Arc<dyn SharedStore>, StoreError> {
    match redis_url {
        Some(url) => {
            let store = RedisStore::connect(url, pool_size, timeout).await?;
            Ok(Arc::new(TimeoutStore::new(store, timeout)))
        }
        None => Ok(Arc::new(TimeoutStore::new(
            LocalStore::with_capacity(local_capacity),
            timeout,
        ))),
    }
}
