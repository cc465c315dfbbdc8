//! Rate-limit middleware.
//!
//! Applied per route group, ahead of any authentication: a rejected request
//! never reaches the directory or the token codec.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::clock::unix_now;
use crate::error::GatewayError;
use crate::rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// State for one rate-limited route group.
#[derive(Clone)]
pub struct ThrottleState {
    pub limiter: RateLimiter,
    pub policy: RateLimitPolicy,
    pub trust_forwarded_for: bool,
}

/// Identity a request is counted against.
///
/// The first `X-Forwarded-For` hop is only honoured behind a trusted proxy;
/// otherwise the socket peer address is used.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded_for: bool,
) -> String {
    if trust_forwarded_for {
        let forwarded = headers
            .get(X_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(addr) = forwarded {
            return addr.to_string();
        }
    }

    match peer {
        Some(addr) => addr.ip().to_string(),
        None => "unknown".to_string(),
    }
}

pub async fn rate_limit_middleware(
    State(throttle): State<ThrottleState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = client_identity(request.headers(), peer, throttle.trust_forwarded_for);

    let decision = throttle.limiter.check(&identity, &throttle.policy).await;

    let mut response = if decision.allowed {
        next.run(request).await
    } else {
        GatewayError::RateLimited {
            retry_after: decision.retry_after_secs(unix_now()),
        }
        .into_response()
    };

    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(decision.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(decision.reset_at));
}
