//! # lexgate
//!
//! A secure content delivery gateway for documents and videos stored in
//! S3-compatible object storage.
//!
//! The gateway issues short-lived, signed capability tokens that scope one
//! subject to one storage key, verifies them without touching the main
//! session system, and streams the objects with correct HTTP byte-range
//! semantics. The backing store is shielded by a metadata cache and by rate
//! limiting.
//!
//! ## Features
//!
//! - **Capability tokens**: HMAC-SHA256 signed, three base64url segments,
//!   verified in constant time
//! - **Range streaming**: single-range `Range` requests are passed through to
//!   the store, and bodies are piped without buffering
//! - **Shared state**: rate-limit counters and caches live in Redis, or in a
//!   bounded in-process store when none is configured
//! - **Fail open**: store outages degrade to "allow" and "cache miss"
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`token`] - Token codec and claims
//! - [`keys`] - Storage-key safety checks
//! - [`range`] - Range header resolution
//! - [`store`] - Shared key/value store (Redis or local)
//! - [`rate_limit`] - Fixed-window rate limiter
//! - [`cache`] - Metadata and entitlement read-through caches
//! - [`storage`] - Backing object store (S3)
//! - [`directory`] - Identity, membership, and resource directory
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use lexgate::{
//!     connect_store, create_router, create_s3_client, BucketNames, GatewayServices,
//!     HttpDirectory, RouterConfig, S3BlobStore, TokenCodec, DEFAULT_STORE_TIMEOUT,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = create_s3_client(None, "us-east-1").await;
//!     let services = GatewayServices {
//!         codec: TokenCodec::new("a-signing-secret-of-at-least-32-bytes"),
//!         blobs: Arc::new(S3BlobStore::new(client, BucketNames::new("docs", "videos"))),
//!         directory: Arc::new(HttpDirectory::new(
//!             "https://members.internal/api",
//!             None,
//!             Duration::from_secs(2),
//!         )?),
//!         store: connect_store(None, 10_000, 16, DEFAULT_STORE_TIMEOUT).await?,
//!     };
//!
//!     let router = create_router(services, RouterConfig::default());
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod keys;
pub mod range;
pub mod rate_limit;
pub mod server;
pub mod storage;
pub mod store;
pub mod token;

// Re-export commonly used types
pub use cache::{EntitlementCache, MetadataCache, ObjectMetadata, ReadThroughCache};
pub use config::{Cli, Command, MintConfig, MintOutputFormat, ServeConfig};
pub use directory::{
    Directory, EntitlementDecision, EntitlementStatus, HttpDirectory, ResourceLocation,
};
pub use error::{DirectoryError, GatewayError, KeyError, StorageError, StoreError};
pub use keys::StorageKey;
pub use range::{resolve as resolve_range, ByteRange, RangeResolution};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use server::{
    create_router, AppState, ErrorResponse, GatewayServices, HealthResponse, IssueRequest,
    IssueResponse, RouterConfig,
};
pub use storage::{create_s3_client, BlobStore, BucketNames, ObjectBody, ObjectHead, S3BlobStore};
pub use store::{
    connect_store, LocalStore, RedisStore, SharedStore, TimeoutStore, DEFAULT_STORE_TIMEOUT,
};
pub use token::{BucketClass, Claims, Grant, MintedToken, TokenCodec, TokenError, TokenTtl};
