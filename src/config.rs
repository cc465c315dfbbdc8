//! Configuration management for lexgate.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `LEXGATE_` prefix
//! - Defaults for every optional setting
//!
//! The gateway fails closed: `serve` refuses to start unless the signing
//! secret, both bucket names, and the directory URL are present and valid.
//!
//! # Environment Variables
//!
//! - `LEXGATE_HOST` - Server bind address (default: 0.0.0.0)
//! - `LEXGATE_PORT` - Server port (default: 8080)
//! - `LEXGATE_SIGNING_SECRET` - HMAC secret for capability tokens (required, >= 32 bytes)
//! - `LEXGATE_DOCUMENT_BUCKET` / `LEXGATE_VIDEO_BUCKET` - Bucket per class (required)
//! - `LEXGATE_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `LEXGATE_S3_REGION` - AWS region (default: us-east-1)
//! - `LEXGATE_DIRECTORY_URL` - Identity/membership directory base URL (required)
//! - `LEXGATE_STORE_URL` - Redis URL for the shared store (default: in-process store)
//! - `LEXGATE_ADMIN_TOKEN` - Bearer token enabling the invalidation hooks

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::{DEFAULT_ENTITLEMENT_CACHE_TTL, DEFAULT_METADATA_CACHE_TTL};
use crate::rate_limit::RateLimitPolicy;
use crate::server::responder::DEFAULT_PRIVATE_MAX_AGE;
use crate::store::{DEFAULT_LOCAL_STORE_CAPACITY, DEFAULT_STORE_TIMEOUT};
use crate::token::{
    BucketClass, TokenTtl, DEFAULT_DOCUMENT_TOKEN_TTL, DEFAULT_VIDEO_TOKEN_TTL,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Minimum signing secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Minimum admin token length in characters.
pub const MIN_ADMIN_TOKEN_LEN: usize = 16;

/// Default Redis pool size.
pub const DEFAULT_STORE_POOL_SIZE: usize = 16;

/// Default directory request timeout in milliseconds.
pub const DEFAULT_DIRECTORY_TIMEOUT_MS: u64 = 2000;

// =============================================================================
// CLI Arguments
// =============================================================================

/// lexgate - secure content delivery gateway.
///
/// Issues short-lived capability tokens for documents and videos and streams
/// the objects from S3 with byte-range support.
#[derive(Parser, Debug, Clone)]
#[command(name = "lexgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the gateway.
    Serve(ServeConfig),

    /// Mint a capability token offline (operators and debugging).
    Mint(MintConfig),
}

/// Configuration for `lexgate serve`.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "LEXGATE_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "LEXGATE_PORT")]
    pub port: u16,

    // =========================================================================
    // Token Configuration
    // =========================================================================
    /// Secret key for HMAC-SHA256 capability tokens (at least 32 bytes).
    #[arg(long, env = "LEXGATE_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: Option<String>,

    /// Document token lifetime in seconds.
    #[arg(long, default_value_t = DEFAULT_DOCUMENT_TOKEN_TTL.as_secs(), env = "LEXGATE_DOCUMENT_TOKEN_TTL")]
    pub document_token_ttl: u64,

    /// Video token lifetime in seconds (one playback session).
    #[arg(long, default_value_t = DEFAULT_VIDEO_TOKEN_TTL.as_secs(), env = "LEXGATE_VIDEO_TOKEN_TTL")]
    pub video_token_ttl: u64,

    // =========================================================================
    // S3 Configuration
    // =========================================================================
    /// Bucket holding documents.
    #[arg(long, env = "LEXGATE_DOCUMENT_BUCKET")]
    pub document_bucket: Option<String>,

    /// Bucket holding videos.
    #[arg(long, env = "LEXGATE_VIDEO_BUCKET")]
    pub video_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, env = "LEXGATE_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "LEXGATE_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Directory Configuration
    // =========================================================================
    /// Base URL of the identity and membership directory.
    #[arg(long, env = "LEXGATE_DIRECTORY_URL")]
    pub directory_url: Option<String>,

    /// API key sent to the directory.
    #[arg(long, env = "LEXGATE_DIRECTORY_API_KEY", hide_env_values = true)]
    pub directory_api_key: Option<String>,

    /// Directory request timeout in milliseconds.
    #[arg(long, default_value_t = DEFAULT_DIRECTORY_TIMEOUT_MS, env = "LEXGATE_DIRECTORY_TIMEOUT_MS")]
    pub directory_timeout_ms: u64,

    // =========================================================================
    // Shared Store Configuration
    // =========================================================================
    /// Redis URL for rate-limit counters and caches.
    ///
    /// If not specified, a bounded in-process store is used and limits are
    /// per instance.
    #[arg(long, env = "LEXGATE_STORE_URL", hide_env_values = true)]
    pub store_url: Option<String>,

    /// Redis connection pool size.
    #[arg(long, default_value_t = DEFAULT_STORE_POOL_SIZE, env = "LEXGATE_STORE_POOL_SIZE")]
    pub store_pool_size: usize,

    /// Upper bound on a single store call in milliseconds.
    #[arg(long, default_value_t = DEFAULT_STORE_TIMEOUT.as_millis() as u64, env = "LEXGATE_STORE_TIMEOUT_MS")]
    pub store_timeout_ms: u64,

    /// Maximum entries in the in-process store.
    #[arg(long, default_value_t = DEFAULT_LOCAL_STORE_CAPACITY, env = "LEXGATE_LOCAL_STORE_CAPACITY")]
    pub local_store_capacity: usize,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Object metadata cache TTL in seconds.
    #[arg(long, default_value_t = DEFAULT_METADATA_CACHE_TTL.as_secs(), env = "LEXGATE_METADATA_CACHE_TTL")]
    pub metadata_cache_ttl: u64,

    /// Entitlement decision cache TTL in seconds.
    #[arg(long, default_value_t = DEFAULT_ENTITLEMENT_CACHE_TTL.as_secs(), env = "LEXGATE_ENTITLEMENT_CACHE_TTL")]
    pub entitlement_cache_ttl: u64,

    /// Browser-only Cache-Control max-age for served content, in seconds.
    #[arg(long, default_value_t = DEFAULT_PRIVATE_MAX_AGE, env = "LEXGATE_PRIVATE_MAX_AGE")]
    pub private_max_age: u32,

    // =========================================================================
    // Rate Limit Configuration
    // =========================================================================
    /// Maximum issue requests per client per window.
    #[arg(long, default_value_t = RateLimitPolicy::STRICT.max_requests, env = "LEXGATE_ISSUE_RATE_LIMIT")]
    pub issue_rate_limit: u64,

    /// Issue rate-limit window in seconds.
    #[arg(long, default_value_t = RateLimitPolicy::STRICT.window.as_secs(), env = "LEXGATE_ISSUE_RATE_WINDOW")]
    pub issue_rate_window: u64,

    /// Maximum serve requests per client per window.
    #[arg(long, default_value_t = RateLimitPolicy::RELAXED.max_requests, env = "LEXGATE_SERVE_RATE_LIMIT")]
    pub serve_rate_limit: u64,

    /// Serve rate-limit window in seconds.
    #[arg(long, default_value_t = RateLimitPolicy::RELAXED.window.as_secs(), env = "LEXGATE_SERVE_RATE_WINDOW")]
    pub serve_rate_window: u64,

    /// Identify clients by the first X-Forwarded-For hop.
    ///
    /// Only enable behind a proxy that overwrites the header.
    #[arg(long, default_value_t = false, env = "LEXGATE_TRUST_FORWARDED_FOR")]
    pub trust_forwarded_for: bool,

    // =========================================================================
    // HTTP Configuration
    // =========================================================================
    /// Omit the `Secure` attribute on the video cookie.
    ///
    /// WARNING: only for local development over plain HTTP.
    #[arg(long, default_value_t = false, env = "LEXGATE_INSECURE_COOKIES")]
    pub insecure_cookies: bool,

    /// Bearer token for the invalidation hooks (at least 16 characters).
    ///
    /// If not specified, the hook routes are not mounted.
    #[arg(long, env = "LEXGATE_ADMIN_TOKEN", hide_env_values = true)]
    pub admin_token: Option<String>,

    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin (without credentials).
    #[arg(long, env = "LEXGATE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match self.signing_secret.as_deref() {
            None | Some("") => {
                return Err(
                    "Signing secret is required. Set --signing-secret or LEXGATE_SIGNING_SECRET"
                        .to_string(),
                )
            }
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(format!(
                    "Signing secret must be at least {} bytes",
                    MIN_SECRET_LEN
                ))
            }
            Some(_) => {}
        }

        if is_blank(&self.document_bucket) {
            return Err(
                "Document bucket is required. Set --document-bucket or LEXGATE_DOCUMENT_BUCKET"
                    .to_string(),
            );
        }
        if is_blank(&self.video_bucket) {
            return Err(
                "Video bucket is required. Set --video-bucket or LEXGATE_VIDEO_BUCKET".to_string(),
            );
        }

        match self.directory_url.as_deref() {
            None | Some("") => {
                return Err(
                    "Directory URL is required. Set --directory-url or LEXGATE_DIRECTORY_URL"
                        .to_string(),
                )
            }
            Some(url) => {
                let parsed =
                    url::Url::parse(url).map_err(|e| format!("Invalid directory URL: {}", e))?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err("Directory URL must use http or https".to_string());
                }
            }
        }

        if let Some(url) = self.store_url.as_deref() {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                return Err("Store URL must start with redis:// or rediss://".to_string());
            }
        }

        if let Some(token) = self.admin_token.as_deref() {
            if token.len() < MIN_ADMIN_TOKEN_LEN {
                return Err(format!(
                    "Admin token must be at least {} characters",
                    MIN_ADMIN_TOKEN_LEN
                ));
            }
        }

        if self.document_token_ttl == 0 || self.video_token_ttl == 0 {
            return Err("Token TTLs must be greater than 0".to_string());
        }
        if self.metadata_cache_ttl == 0 || self.entitlement_cache_ttl == 0 {
            return Err("Cache TTLs must be greater than 0".to_string());
        }
        if self.issue_rate_limit == 0 || self.serve_rate_limit == 0 {
            return Err("Rate limits must be greater than 0".to_string());
        }
        if self.issue_rate_window == 0 || self.serve_rate_window == 0 {
            return Err("Rate-limit windows must be greater than 0".to_string());
        }
        if self.store_timeout_ms == 0 || self.directory_timeout_ms == 0 {
            return Err("Timeouts must be greater than 0".to_string());
        }
        if self.store_pool_size == 0 || self.local_store_capacity == 0 {
            return Err("store_pool_size and local_store_capacity must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The signing secret, or empty if unset (call validate() first).
    pub fn signing_secret_or_empty(&self) -> &str {
        self.signing_secret.as_deref().unwrap_or("")
    }

    pub fn token_ttl(&self) -> TokenTtl {
        TokenTtl::new(
            Duration::from_secs(self.document_token_ttl),
            Duration::from_secs(self.video_token_ttl),
        )
    }

    pub fn issue_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::STRICT.with_limits(self.issue_rate_window, self.issue_rate_limit)
    }

    pub fn serve_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::RELAXED.with_limits(self.serve_rate_window, self.serve_rate_limit)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn directory_timeout(&self) -> Duration {
        Duration::from_millis(self.directory_timeout_ms)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

// =============================================================================
// Mint Command
// =============================================================================

/// Output format for `lexgate mint`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MintOutputFormat {
    /// Print only the token
    #[default]
    Token,
    /// Print the token and its claims as JSON
    Json,
}

/// Configuration for `lexgate mint`.
#[derive(Args, Debug, Clone)]
pub struct MintConfig {
    /// Signing secret (must match the gateway's).
    #[arg(long, env = "LEXGATE_SIGNING_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Subject the token is issued to.
    #[arg(long)]
    pub subject: String,

    /// Storage key the token grants access to.
    #[arg(long)]
    pub key: String,

    /// Bucket class of the key (document or video).
    #[arg(long, default_value = "document")]
    pub bucket_class: BucketClass,

    /// Token lifetime in seconds (defaults to the class preset).
    #[arg(long)]
    pub ttl: Option<u64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = MintOutputFormat::Token)]
    pub format: MintOutputFormat,
}

impl MintConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(format!(
                "Signing secret must be at least {} bytes",
                MIN_SECRET_LEN
            ));
        }
        if self.subject.trim().is_empty() {
            return Err("Subject must not be empty".to_string());
        }
        crate::keys::StorageKey::parse(&self.key).map_err(|e| format!("Invalid key: {}", e))?;
        if self.ttl == Some(0) {
            return Err("TTL must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
            .map(Duration::from_secs)
            .unwrap_or_else(|| TokenTtl::default().for_class(self.bucket_class))
    }
}

// =============================================================================
// Tests
// =============================================================================
