use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ReadThroughCache;
use crate::clock::unix_now;
use crate::error::StorageError;
use crate::keys::StorageKey;
use crate::storage::BlobStore;
use crate::store::SharedStore;
use crate::token::BucketClass;

/// Default lifetime of a cached object description (1 hour).
pub const DEFAULT_METADATA_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Object description as cached between requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub size: u64,

    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub etag: Option<String>,

    #[serde(default)]
    pub last_modified: Option<String>,

    /// When this entry was fetched from the store (Unix epoch seconds)
    pub cached_at: u64,
}

/// Caches `HEAD` results per (bucket class, key).
///
/// A zero-size object is returned to the caller but not cached; the object
/// may still be uploading. Not-found results are never cached.
pub struct MetadataCache {
    inner: ReadThroughCache<ObjectMetadata>,
}

impl MetadataCache {
    pub fn new(store: Arc<dyn SharedStore>, ttl: Duration) -> Self {
        Self {
            inner: ReadThroughCache::new(store, "meta", ttl),
        }
    }

    fn cache_key(bucket: BucketClass, key: &str) -> String {
        format!("{}:{}", bucket, key)
    }

    /// Return the object's metadata, consulting the backing store on a miss.
    pub async fn resolve(
        &self,
        blobs: &dyn BlobStore,
        bucket: BucketClass,
        key: &StorageKey,
    ) -> Result<ObjectMetadata, StorageError> {
        self.inner
            .get_or_fetch_where(
                &Self::cache_key(bucket, key.as_str()),
                || async {
                    let head = blobs.head(bucket, key).await?;
                    Ok(ObjectMetadata {
                        size: head.size,
                        content_type: head.content_type,
                        etag: head.etag,
                        last_modified: head.last_modified,
                        cached_at: unix_now(),
                    })
                },
                |meta| meta.size > 0,
            )
            .await
    }

    pub async fn peek(&self, bucket: BucketClass, key: &str) -> Option<ObjectMetadata> {
        self.inner.peek(&Self::cache_key(bucket, key)).await
    }

    /// Drop the cached entry after the object was replaced or deleted.
    pub async fn invalidate(&self, bucket: BucketClass, key: &str) {
        self.inner.invalidate(&Self::cache_key(bucket, key)).await
    }
}
