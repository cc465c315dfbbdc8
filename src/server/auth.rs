//! Credential extraction and the admin guard for invalidation hooks.
//!
//! Three credentials reach the gateway:
//!
//! ```text
//! Authorization: Bearer <user credential>   issue endpoints, resolved by the directory
//! ?token=<capability token>                 document serve endpoint
//! Cookie: lexgate_video=<capability token>  video serve endpoint (never the query string)
//! Authorization: Bearer <admin token>       invalidation hooks, compared in constant time
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::error::GatewayError;

/// Name of the cookie carrying the video token.
pub const VIDEO_COOKIE: &str = "lexgate_video";

/// Path prefix the video cookie is scoped to.
pub const VIDEO_COOKIE_PATH: &str = "/media/video";

/// Extract the credential from an `Authorization: Bearer` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, credential) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let credential = credential.trim();
    if credential.is_empty() {
        None
    } else {
        Some(credential)
    }
}

/// Read a cookie by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// Build the `Set-Cookie` value delivering a video token.
pub fn video_cookie(token: &str, max_age_secs: u64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path={}; HttpOnly; SameSite=Strict; Max-Age={}",
        VIDEO_COOKIE, token, VIDEO_COOKIE_PATH, max_age_secs
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Shared secret guarding the invalidation hooks.
#[derive(Clone)]
pub struct AdminAuth {
    token: Arc<[u8]>,
}

impl AdminAuth {
    pub fn new(token: impl AsRef<[u8]>) -> Self {
        Self {
            token: Arc::from(token.as_ref()),
        }
    }

    pub fn verify(&self, presented: &str) -> bool {
        bool::from(presented.as_bytes().ct_eq(&self.token))
    }
}

impl std::fmt::Debug for AdminAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminAuth").finish_non_exhaustive()
    }
}

/// Middleware rejecting hook calls without the admin bearer token.
pub async fn admin_auth_middleware(
    State(auth): State<AdminAuth>,
    request: Request,
    next: Next,
) -> Result<Response, GatewayError> {
    match bearer_token(request.headers()) {
        Some(presented) if auth.verify(presented) => Ok(next.run(request).await),
        Some(_) => {
            warn!(path = %request.uri().path(), "Rejected hook call with wrong admin token");
            Err(GatewayError::Unauthorized("invalid admin token".to_string()))
        }
        None => Err(GatewayError::Unauthorized("missing admin token".to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
