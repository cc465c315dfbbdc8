use std::sync::Arc;
use std::time::Duration;

use super::ReadThroughCache;
use crate::directory::{Directory, EntitlementDecision};
use crate::error::DirectoryError;
use crate::store::SharedStore;

/// Default lifetime of a cached entitlement decision (2 minutes).
///
/// Kept short: a revoked membership stays effective for at most this long
/// unless the directory calls the invalidation hook.
pub const DEFAULT_ENTITLEMENT_CACHE_TTL: Duration = Duration::from_secs(120);

/// Caches the directory's entitlement decision per subject.
pub struct EntitlementCache {
    inner: ReadThroughCache<EntitlementDecision>,
}

impl EntitlementCache {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration) -> Self {
        Self {
            inner: ReadThroughCache::new(store, "entitlement", ttl),
        }
    }

    pub async fn resolve(
        &self,
        directory: &dyn Directory,
        subject: &str,
    ) -> Result<EntitlementDecision, DirectoryError> {
        self.inner
            .get_or_fetch(subject, || directory.entitlement(subject))
            .await
    }

    pub async fn peek(&self, subject: &str) -> Option<EntitlementDecision> {
        self.inner.peek(subject).await
    }

    pub async fn invalidate(&self, subject: &str) {
        self.inner.invalidate(subject).await
    }
}
