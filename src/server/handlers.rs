//! HTTP request handlers for the gateway.
//!
//! # Endpoints
//!
//! - `POST /access/document` - Issue a document token (returned in the body)
//! - `POST /access/video` - Issue a video token (delivered as a cookie)
//! - `GET /media/document?token=...` - Stream a document
//! - `GET /media/video` - Stream a video (token from cookie only)
//! - `POST /hooks/content-updated` - Invalidate cached object metadata
//! - `POST /hooks/entitlement-updated` - Invalidate a cached entitlement
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::auth::{bearer_token, cookie_value, video_cookie, VIDEO_COOKIE};
use super::responder::{self, Disposition, ResponseOptions};
use crate::cache::{EntitlementCache, MetadataCache};
use crate::clock::unix_now;
use crate::directory::Directory;
use crate::error::GatewayError;
use crate::keys::StorageKey;
use crate::range::{self, RangeResolution};
use crate::storage::BlobStore;
use crate::token::{BucketClass, Grant, MintedToken, TokenCodec, TokenError, TokenTtl};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state, passed to all handlers via Axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub codec: TokenCodec,
    pub blobs: Arc<dyn BlobStore>,
    pub directory: Arc<dyn Directory>,
    pub metadata: Arc<MetadataCache>,
    pub entitlements: Arc<EntitlementCache>,
    pub token_ttl: TokenTtl,

    /// Browser-only max-age for mutable content, in seconds
    pub private_max_age: u32,

    /// Add `Secure` to the video cookie
    pub secure_cookies: bool,

    /// Shared store backend label, reported by `/health`
    pub store_mode: &'static str,
}

// =============================================================================
// Request / Response Types
// =============================================================================

/// Body of an issue request.
#[derive(Debug, Deserialize)]
pub struct IssueRequest {
    /// Opaque business identifier, resolved by the directory
    #[serde(default)]
    pub resource_id: String,
}

/// Presentation hints returned alongside a token.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentHints {
    pub bucket_class: BucketClass,
    pub content_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// Response of an issue request.
#[derive(Debug, Serialize, Deserialize)]
pub struct IssueResponse {
    /// Absent for the video flow, where the token travels as a cookie
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Unix epoch seconds
    pub expires_at: u64,

    pub content_hints: ContentHints,
}

/// Query parameters of the document serve endpoint.
#[derive(Debug, Deserialize)]
pub struct DocumentQuery {
    #[serde(default)]
    pub token: Option<String>,

    /// Requested download filename (sanitized before use)
    #[serde(default)]
    pub filename: Option<String>,

    /// `1` or `true` to serve as an attachment
    #[serde(default)]
    pub download: Option<String>,
}

impl DocumentQuery {
    fn disposition(&self) -> Disposition {
        match self.download.as_deref() {
            Some("1") | Some("true") => Disposition::Attachment,
            _ => Disposition::Inline,
        }
    }
}

/// Body of the content-updated hook.
#[derive(Debug, Deserialize)]
pub struct ContentUpdated {
    pub bucket_class: BucketClass,
    pub key: String,
}

/// Body of the entitlement-updated hook.
#[derive(Debug, Deserialize)]
pub struct EntitlementUpdated {
    pub subject: String,
}

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "unauthorized")
    pub error: String,

    /// Generic human-readable message; never carries backend detail
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Shared store backend (`local` or `redis`)
    pub store: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert GatewayError to HTTP response.
///
/// The body is always a generic `ErrorResponse`; the detailed message is
/// logged by severity:
/// - 5xx errors are logged at ERROR level
/// - 401/404 at DEBUG (common and expected)
/// - other 4xx at WARN
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            GatewayError::Unauthorized(_) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid credentials",
            ),
            GatewayError::Forbidden(_) => (
                StatusCode::FORBIDDEN,
                "forbidden",
                "Access to this resource is not permitted",
            ),
            GatewayError::BadRequest(_) => (
                StatusCode::BAD_REQUEST,
                "bad_request",
                "The request could not be processed",
            ),
            GatewayError::NotFound(_) => (
                StatusCode::NOT_FOUND,
                "not_found",
                "Resource not found",
            ),
            GatewayError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Too many requests",
            ),
            GatewayError::RangeNotSatisfiable { .. } => (
                StatusCode::RANGE_NOT_SATISFIABLE,
                "range_not_satisfiable",
                "Requested range not satisfiable",
            ),
            GatewayError::StaleMetadata { .. } | GatewayError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal server error",
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            );
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                self
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                self
            );
        }

        let mut response =
            (status, Json(ErrorResponse::new(error_type, message))).into_response();

        let headers = response.headers_mut();
        match self {
            GatewayError::Unauthorized(_) => {
                headers.insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            GatewayError::RateLimited { retry_after } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            }
            GatewayError::RangeNotSatisfiable { total_size } => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total_size)) {
                    headers.insert(header::CONTENT_RANGE, value);
                }
            }
            _ => {}
        }

        response
    }
}

// =============================================================================
// Issue Handlers
// =============================================================================

/// Issue a document token, returned in the response body.
pub async fn issue_document_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<IssueResponse>, GatewayError> {
    let (minted, content_hints) = issue(&state, &headers, body, BucketClass::Document).await?;

    Ok(Json(IssueResponse {
        token: Some(minted.token),
        expires_at: minted.claims.expires_at,
        content_hints,
    }))
}

/// Issue a video token, delivered as an `HttpOnly` cookie scoped to the
/// video serve route. The body carries no token.
pub async fn issue_video_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    let (minted, content_hints) = issue(&state, &headers, body, BucketClass::Video).await?;

    let max_age = state.token_ttl.for_class(BucketClass::Video).as_secs();
    let cookie = video_cookie(&minted.token, max_age, state.secure_cookies);
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| GatewayError::Internal(format!("unrepresentable cookie: {}", e)))?;

    let body = IssueResponse {
        token: None,
        expires_at: minted.claims.expires_at,
        content_hints,
    };

    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// Authenticate, check entitlement, and mint a token for one resource.
async fn issue(
    state: &AppState,
    headers: &HeaderMap,
    body: Result<Json<IssueRequest>, JsonRejection>,
    class: BucketClass,
) -> Result<(MintedToken, ContentHints), GatewayError> {
    let bearer = bearer_token(headers)
        .ok_or_else(|| GatewayError::Unauthorized("missing bearer credential".to_string()))?;

    let subject = state
        .directory
        .authenticate(bearer)
        .await?
        .ok_or_else(|| GatewayError::Unauthorized("bearer credential rejected".to_string()))?;

    let Json(request) = body.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let resource_id = request.resource_id.trim();
    if resource_id.is_empty() {
        return Err(GatewayError::BadRequest("resource_id is required".to_string()));
    }

    let location = state
        .directory
        .resolve_resource(resource_id)
        .await?
        .filter(|location| location.bucket_class == class)
        .ok_or_else(|| {
            GatewayError::NotFound(format!("no {} resource '{}'", class, resource_id))
        })?;

    let key = StorageKey::parse(&location.key).map_err(|e| {
        GatewayError::Internal(format!(
            "directory mapped '{}' to an unsafe key: {}",
            resource_id, e
        ))
    })?;

    if !location.free {
        let decision = state
            .entitlements
            .resolve(state.directory.as_ref(), &subject)
            .await?;
        if !decision.is_entitled_at(unix_now()) {
            return Err(GatewayError::Forbidden(format!(
                "subject has entitlement status {:?}",
                decision.status
            )));
        }
    }

    let grant = Grant::new(subject, key.as_str(), class);
    let minted = state.codec.mint(&grant, state.token_ttl.for_class(class));

    info!(
        bucket = %class,
        resource_id = resource_id,
        expires_at = minted.claims.expires_at,
        "Issued access token"
    );

    let content_hints = ContentHints {
        bucket_class: class,
        content_type: responder::content_type_for(location.content_type.as_deref(), &key),
        filename: location.filename,
    };

    Ok((minted, content_hints))
}

// =============================================================================
// Serve Handlers
// =============================================================================

/// Stream a document. The token comes from the `token` query parameter.
pub async fn serve_document_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<DocumentQuery>, QueryRejection>,
) -> Result<Response, GatewayError> {
    let Query(query) = query.map_err(|e| GatewayError::BadRequest(e.body_text()))?;

    let options = ResponseOptions {
        filename: query.filename.as_deref(),
        disposition: query.disposition(),
        private_max_age: state.private_max_age,
    };

    serve(
        &state,
        &headers,
        query.token.as_deref(),
        BucketClass::Document,
        &options,
    )
    .await
}

/// Stream a video. The token is read from the cookie only; a `token` query
/// parameter is ignored.
pub async fn serve_video_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, GatewayError> {
    let options = ResponseOptions {
        filename: None,
        disposition: Disposition::Inline,
        private_max_age: state.private_max_age,
    };

    serve(
        &state,
        &headers,
        cookie_value(&headers, VIDEO_COOKIE),
        BucketClass::Video,
        &options,
    )
    .await
}

/// Verify the token, check the key, resolve metadata and range, then stream.
async fn serve(
    state: &AppState,
    headers: &HeaderMap,
    token: Option<&str>,
    class: BucketClass,
    options: &ResponseOptions<'_>,
) -> Result<Response, GatewayError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| GatewayError::Unauthorized("missing token".to_string()))?;

    let claims = state.codec.verify(token).map_err(|e| {
        if e == TokenError::InvalidSignature {
            warn!(bucket = %class, "Rejected token with invalid signature");
        }
        GatewayError::from(e)
    })?;

    if claims.bucket_class != class {
        return Err(GatewayError::Unauthorized(format!(
            "token minted for {} presented to {} route",
            claims.bucket_class, class
        )));
    }

    let key = StorageKey::parse(&claims.resource_key).map_err(|e| {
        warn!(bucket = %class, reason = %e, "Refused unsafe key from signed token");
        GatewayError::from(e)
    })?;

    let meta = state
        .metadata
        .resolve(state.blobs.as_ref(), class, &key)
        .await?;

    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let range = match range::resolve(range_header, meta.size) {
        RangeResolution::Full => None,
        RangeResolution::Partial(range) => Some(range),
        RangeResolution::Unsatisfiable => {
            return Err(GatewayError::RangeNotSatisfiable {
                total_size: meta.size,
            })
        }
    };

    let result =
        responder::stream_object(state.blobs.as_ref(), class, &key, &meta, range, options).await;
    if let Err(GatewayError::StaleMetadata { .. }) = &result {
        state.metadata.invalidate(class, key.as_str()).await;
    }
    result
}

// =============================================================================
// Invalidation Hooks
// =============================================================================

/// Drop cached metadata after an object was replaced or deleted.
pub async fn content_updated_handler(
    State(state): State<AppState>,
    body: Result<Json<ContentUpdated>, JsonRejection>,
) -> Result<StatusCode, GatewayError> {
    let Json(event) = body.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    if event.key.is_empty() {
        return Err(GatewayError::BadRequest("key is required".to_string()));
    }

    state.metadata.invalidate(event.bucket_class, &event.key).await;
    info!(bucket = %event.bucket_class, key = %event.key, "Invalidated object metadata");

    Ok(StatusCode::NO_CONTENT)
}

/// Drop a cached entitlement after the approval workflow changed it.
pub async fn entitlement_updated_handler(
    State(state): State<AppState>,
    body: Result<Json<EntitlementUpdated>, JsonRejection>,
) -> Result<StatusCode, GatewayError> {
    let Json(event) = body.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    if event.subject.is_empty() {
        return Err(GatewayError::BadRequest("subject is required".to_string()));
    }

    state.entitlements.invalidate(&event.subject).await;
    info!("Invalidated entitlement decision");

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Health
// =============================================================================

/// Health check endpoint.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        store: state.store_mode.to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
