//! Fixed-window request counting keyed by client identity.
//!
//! Each request increments the counter for `(policy, identity, floor(now / window))`
//! in the shared store. The counter expires with its window, so there is no
//! explicit cleanup.
//!
//! When the store is unavailable or slow the limiter fails open: an outage
//! of the counter store must not take the gateway down with it.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::clock::unix_now;
use crate::store::SharedStore;

/// Window length and quota for one class of endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Namespace for counter keys, so two policies never share a counter
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u64,
}

impl RateLimitPolicy {
    /// Token-issuing endpoints: a handful of requests per minute.
    pub const STRICT: RateLimitPolicy = RateLimitPolicy::new("issue", 60, 10);

    /// Content-serving endpoints: a single video seek can fan out into many
    /// small range requests within a few seconds.
    pub const RELAXED: RateLimitPolicy = RateLimitPolicy::new("serve", 10, 120);

    pub const fn new(name: &'static str, window_secs: u64, max_requests: u64) -> Self {
        Self {
            name,
            window: Duration::from_secs(window_secs),
            max_requests,
        }
    }

    /// Same namespace with a different window and quota.
    pub fn with_limits(self, window_secs: u64, max_requests: u64) -> Self {
        Self::new(self.name, window_secs, max_requests)
    }

    fn window_secs(&self) -> u64 {
        self.window.as_secs().max(1)
    }
}

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    /// Unix epoch seconds at which the current window ends
    pub reset_at: u64,
}

impl RateLimitDecision {
    /// Seconds until the window resets, at least 1.
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).max(1)
    }
}

/// Rate limiter over an injected shared store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn SharedStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn SharedStore>) -> Self {
        Self { store }
    }

    /// Count one request from `identity` against `policy`.
    pub async fn check(&self, identity: &str, policy: &RateLimitPolicy) -> RateLimitDecision {
        self.check_at(identity, policy, unix_now()).await
    }

    /// Count one request as if the current time were `now`.
    pub async fn check_at(
        &self,
        identity: &str,
        policy: &RateLimitPolicy,
        now: u64,
    ) -> RateLimitDecision {
        let window = policy.window_secs();
        let bucket = now / window;
        let reset_at = (bucket + 1) * window;
        let key = format!("ratelimit:{}:{}:{}", policy.name, identity, bucket);

        match self
            .store
            .incr_with_expiry(&key, Duration::from_secs(window))
            .await
        {
            Ok(count) => {
                let allowed = count <= policy.max_requests;
                if !allowed {
                    debug!(
                        policy = policy.name,
                        identity = identity,
                        count = count,
                        "Rate limit exceeded"
                    );
                }
                RateLimitDecision {
                    allowed,
                    limit: policy.max_requests,
                    remaining: policy.max_requests.saturating_sub(count),
                    reset_at,
                }
            }
            Err(e) => {
                warn!(
                    policy = policy.name,
                    error = %e,
                    "Rate limit store unavailable, allowing request"
                );
                RateLimitDecision {
                    allowed: true,
                    limit: policy.max_requests,
                    remaining: policy.max_requests,
                    reset_at,
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
