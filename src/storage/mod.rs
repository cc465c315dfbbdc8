//! Backing object store.
//!
//! The gateway only needs two operations from the store: `head` for object
//! metadata and `get` for a (possibly range-scoped) byte stream. Both take a
//! [`StorageKey`], so only keys that passed the safety checks can reach a
//! backend.
//!
//! Results are typed: [`StorageError::NotFound`] is distinct from every other
//! failure and is what the responder maps to 404.

mod s3;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::StorageError;
use crate::keys::StorageKey;
use crate::range::ByteRange;
use crate::token::BucketClass;

pub use s3::{create_s3_client, BucketNames, S3BlobStore};

/// Streamed object body. Dropping it abandons the backend transfer.
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Object metadata as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHead {
    pub size: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// HTTP-date formatted
    pub last_modified: Option<String>,
}

/// A body returned by [`BlobStore::get`].
pub struct ObjectBody {
    pub stream: ByteStream,
    pub content_length: Option<u64>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Capability-addressed blob backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch object metadata without the body.
    async fn head(&self, bucket: BucketClass, key: &StorageKey) -> Result<ObjectHead, StorageError>;

    /// Open a byte stream for the object, limited to `range` if given.
    async fn get(
        &self,
        bucket: BucketClass,
        key: &StorageKey,
        range: Option<ByteRange>,
    ) -> Result<ObjectBody, StorageError>;
}
