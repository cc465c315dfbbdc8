use thiserror::Error;

/// Errors returned by the backing object store.
///
/// The variant is the discriminator the streaming responder switches on:
/// `NotFound` becomes a 404, everything else a generic 500.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Object does not exist in the bucket
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Any other failure reported by S3 or the S3-compatible service
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// The body stream failed after the response had started
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Errors from the shared key/value store used by the rate limiter and caches.
///
/// None of these are ever surfaced to clients; callers degrade instead.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store could not be reached or rejected the command
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer within the configured timeout
    #[error("Store call timed out after {0}ms")]
    Timeout(u64),

    /// A cached value could not be encoded or decoded
    #[error("Cache codec error: {0}")]
    Codec(String),
}

/// Errors from the external identity / membership directory.
#[derive(Debug, Clone, Error)]
pub enum DirectoryError {
    /// Transport failure talking to the directory
    #[error("Directory request failed: {0}")]
    Transport(String),

    /// The directory answered with an unexpected status or body
    #[error("Directory returned an unexpected response: {0}")]
    Protocol(String),
}

/// Reasons a storage key is refused before it reaches the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("Key is empty")]
    Empty,

    #[error("Key exceeds {max} bytes")]
    TooLong { max: usize },

    #[error("Key is an absolute path")]
    Absolute,

    #[error("Key contains a traversal segment")]
    Traversal,

    #[error("Key contains a backslash")]
    Backslash,

    #[error("Key contains control characters")]
    ControlCharacter,

    #[error("Key contains an empty segment")]
    EmptySegment,
}

/// Request-level failure of an issue or serve call.
///
/// Each variant maps to exactly one HTTP status. Messages are for logs; the
/// body sent to clients is generic.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Range not satisfiable for object of {total_size} bytes")]
    RangeNotSatisfiable { total_size: u64 },

    /// The backend's body length disagrees with the cached object size
    #[error("Backend returned {actual} bytes where {expected} were expected")]
    StaleMetadata { expected: u64, actual: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StorageError> for GatewayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(location) => GatewayError::NotFound(location),
            other => GatewayError::Internal(other.to_string()),
        }
    }
}

impl From<DirectoryError> for GatewayError {
    fn from(err: DirectoryError) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl From<crate::token::TokenError> for GatewayError {
    fn from(err: crate::token::TokenError) -> Self {
        GatewayError::Unauthorized(err.to_string())
    }
}

impl From<KeyError> for GatewayError {
    fn from(err: KeyError) -> Self {
        GatewayError::BadRequest(err.to_string())
    }
}
