//! Counter-and-window limiter.
//!
//! The first hit in a window creates the counter with the scope's window as
//! its TTL; later hits only increment it. A new window opens when the key
//! expires. If the store is unreachable the limiter lets the request
//! through.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use cloudbox_cache::keys;
use cloudbox_core::config::RateLimitConfig;
use cloudbox_core::traits::store::RevocationStore;

use crate::error::{AuthError, AuthResult};

use super::scope::RateScope;

/// Result of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// Under budget.
    Allowed {
        /// Hits left in the current window.
        remaining: u64,
    },
    /// Over budget.
    Denied {
        /// Time until the current window closes.
        retry_after: Duration,
    },
}

impl RateDecision {
    /// Whether the request may proceed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Per-scope fixed-window rate limiter.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    store: Arc<dyn RevocationStore>,
    config: RateLimitConfig,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    pub fn new(store: Arc<dyn RevocationStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Count one hit against `scope:key` and decide.
    pub async fn check(&self, scope: RateScope, key: &str) -> RateDecision {
        let limit = scope.limit(&self.config);
        if !self.config.enabled {
            return RateDecision::Allowed {
                remaining: limit.max_requests,
            };
        }

        let counter = keys::rate_limit(scope.as_str(), key);
        match self.store.incr_window(&counter, limit.window()).await {
            Ok(window) if window.count > limit.max_requests => {
                let retry_after = if window.ttl.is_zero() {
                    limit.window()
                } else {
                    window.ttl
                };
                warn!(
                    scope = %scope,
                    count = window.count,
                    retry_after_secs = retry_after.as_secs(),
                    "Rate limit exceeded"
                );
                RateDecision::Denied { retry_after }
            }
            Ok(window) => RateDecision::Allowed {
                remaining: limit.max_requests - window.count,
            },
            Err(e) => {
                warn!(scope = %scope, error = %e, "Rate limit store unavailable, allowing request");
                RateDecision::Allowed {
                    remaining: limit.max_requests,
                }
            }
        }
    }

    /// Like [`check`](Self::check) but returns `RateLimited` when denied.
    pub async fn enforce(&self, scope: RateScope, key: &str) -> AuthResult<()> {
        match self.check(scope, key).await {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Denied { retry_after } => Err(AuthError::RateLimited { retry_after }),
        }
    }

    /// Forget prior hits, e.g. after a successful login.
    pub async fn reset(&self, scope: RateScope, key: &str) {
        if let Err(e) = self
            .store
            .delete(&keys::rate_limit(scope.as_str(), key))
            .await
        {
            warn!(scope = %scope, error = %e, "Failed to reset rate limit counter");
        }
    }
}
