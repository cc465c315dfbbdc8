//! Router configuration for the gateway.
//!
//! This module defines the HTTP routes and applies middleware for rate
//! limiting, hook authentication, CORS, and tracing.
//!
//! # Route Structure
//!
//! ```text
//! /health                       - Health check (public, not rate limited)
//! /access/document              - Issue document token   (issue policy)
//! /access/video                 - Issue video token      (issue policy)
//! /media/document?token=...     - Stream document        (serve policy)
//! /media/video                  - Stream video           (serve policy)
//! /hooks/content-updated        - Invalidate metadata    (admin token)
//! /hooks/entitlement-updated    - Invalidate entitlement (admin token)
//! ```
//!
//! The hook routes are only mounted when an admin token is configured.
//!
//! # Example
//!
//! ```ignore
//! let services = GatewayServices {
//!     codec: TokenCodec::new(secret),
//!     blobs: Arc::new(S3BlobStore::new(client, buckets)),
//!     directory: Arc::new(HttpDirectory::new(url, None, timeout)?),
//!     store: connect_store(None, 10_000, 16, DEFAULT_STORE_TIMEOUT).await?,
//! };
//!
//! let router = create_router(services, RouterConfig::default());
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use http::header::{
    ACCEPT_RANGES, AUTHORIZATION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE,
};
use http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::{admin_auth_middleware, AdminAuth};
use super::handlers::{
    content_updated_handler, entitlement_updated_handler, health_handler,
    issue_document_handler, issue_video_handler, serve_document_handler, serve_video_handler,
    AppState,
};
use super::responder::DEFAULT_PRIVATE_MAX_AGE;
use super::throttle::{rate_limit_middleware, ThrottleState};
use crate::cache::{
    EntitlementCache, MetadataCache, DEFAULT_ENTITLEMENT_CACHE_TTL, DEFAULT_METADATA_CACHE_TTL,
};
use crate::directory::Directory;
use crate::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::storage::BlobStore;
use crate::store::SharedStore;
use crate::token::{TokenCodec, TokenTtl};

// =============================================================================
// Router Configuration
// =============================================================================

/// Collaborators the gateway is wired to.
#[derive(Clone)]
pub struct GatewayServices {
    pub codec: TokenCodec,
    pub blobs: Arc<dyn BlobStore>,
    pub directory: Arc<dyn Directory>,

    /// Backs the rate limiter and both caches
    pub store: Arc<dyn SharedStore>,
}

/// Configuration for the HTTP router.
#[derive(Clone)]
pub struct RouterConfig {
    pub token_ttl: TokenTtl,
    pub metadata_ttl: Duration,
    pub entitlement_ttl: Duration,

    /// Browser-only max-age for mutable content, in seconds
    pub private_max_age: u32,

    /// Mark the video cookie `Secure`
    pub secure_cookies: bool,

    pub issue_policy: RateLimitPolicy,
    pub serve_policy: RateLimitPolicy,

    /// Count requests against the first `X-Forwarded-For` hop
    pub trust_forwarded_for: bool,

    /// Allowed CORS origins (None = allow any origin, without credentials)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,

    /// Bearer token for the invalidation hooks (None = hooks not mounted)
    pub admin_token: Option<String>,
}

impl Default for RouterConfig {
    /// By default:
    /// - Token TTLs are 5 minutes (document) and 3 hours (video)
    /// - Cookies are `Secure`
    /// - Issue and serve endpoints use the strict and relaxed presets
    /// - CORS allows any origin
    /// - Tracing is enabled, hooks are disabled
    fn default() -> Self {
        Self {
            token_ttl: TokenTtl::default(),
            metadata_ttl: DEFAULT_METADATA_CACHE_TTL,
            entitlement_ttl: DEFAULT_ENTITLEMENT_CACHE_TTL,
            private_max_age: DEFAULT_PRIVATE_MAX_AGE,
            secure_cookies: true,
            issue_policy: RateLimitPolicy::STRICT,
            serve_policy: RateLimitPolicy::RELAXED,
            trust_forwarded_for: false,
            cors_origins: None,
            enable_tracing: true,
            admin_token: None,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token_ttl(mut self, ttl: TokenTtl) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_cache_ttls(mut self, metadata: Duration, entitlement: Duration) -> Self {
        self.metadata_ttl = metadata;
        self.entitlement_ttl = entitlement;
        self
    }

    pub fn with_private_max_age(mut self, seconds: u32) -> Self {
        self.private_max_age = seconds;
        self
    }

    /// Disable the `Secure` cookie attribute.
    ///
    /// **Warning**: only for local development over plain HTTP.
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.secure_cookies = secure;
        self
    }

    pub fn with_rate_limits(mut self, issue: RateLimitPolicy, serve: RateLimitPolicy) -> Self {
        self.issue_policy = issue;
        self.serve_policy = serve;
        self
    }

    pub fn with_trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }

    pub fn with_admin_token(mut self, token: impl Into<String>) -> Self {
        self.admin_token = Some(token.into());
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Rate limiting runs before any handler logic in each group, so a throttled
/// request never reaches the directory or the token codec.
pub fn create_router(services: GatewayServices, config: RouterConfig) -> Router {
    let store_mode = services.store.mode();
    let limiter = RateLimiter::new(Arc::clone(&services.store));

    let state = AppState {
        codec: services.codec,
        blobs: services.blobs,
        directory: services.directory,
        metadata: Arc::new(MetadataCache::new(
            Arc::clone(&services.store),
            config.metadata_ttl,
        )),
        entitlements: Arc::new(EntitlementCache::new(
            Arc::clone(&services.store),
            config.entitlement_ttl,
        )),
        token_ttl: config.token_ttl,
        private_max_age: config.private_max_age,
        secure_cookies: config.secure_cookies,
        store_mode,
    };

    let throttle = |policy: RateLimitPolicy| ThrottleState {
        limiter: limiter.clone(),
        policy,
        trust_forwarded_for: config.trust_forwarded_for,
    };

    let issue_routes = Router::new()
        .route("/access/document", post(issue_document_handler))
        .route("/access/video", post(issue_video_handler))
        .route_layer(middleware::from_fn_with_state(
            throttle(config.issue_policy),
            rate_limit_middleware,
        ));

    let serve_routes = Router::new()
        .route("/media/document", get(serve_document_handler))
        .route("/media/video", get(serve_video_handler))
        .route_layer(middleware::from_fn_with_state(
            throttle(config.serve_policy),
            rate_limit_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .merge(issue_routes)
        .merge(serve_routes);

    if let Some(token) = &config.admin_token {
        let hook_routes = Router::new()
            .route("/hooks/content-updated", post(content_updated_handler))
            .route("/hooks/entitlement-updated", post(entitlement_updated_handler))
            .route_layer(middleware::from_fn_with_state(
                AdminAuth::new(token),
                admin_auth_middleware,
            ));
        router = router.merge(hook_routes);
    }

    let router = router.with_state(state).layer(build_cors_layer(&config));

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
///
/// Credentials (the video cookie) are only allowed for explicitly listed
/// origins; a wildcard origin never carries them.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, RANGE])
        .expose_headers([CONTENT_RANGE, CONTENT_LENGTH, ACCEPT_RANGES])
        .max_age(Duration::from_secs(86400)); // 24 hours

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<HeaderValue> =
                origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins).allow_credentials(true)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
