//! Rate limiting configuration.

use serde::{Deserialize, Serialize};

/// A single scope's budget: at most `max_requests` per `window_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeLimit {
    /// Requests allowed inside one window.
    pub max_requests: u64,
    /// Window length in seconds.
    pub window_seconds: u64,
}

impl ScopeLimit {
    /// Creates a new scope limit.
    pub const fn new(max_requests: u64, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Window length as a `Duration`.
    pub fn window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.window_seconds)
    }
}

/// Per-scope rate limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Master switch. When disabled every check is allowed.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Login attempts per identifier.
    #[serde(default = "default_login")]
    pub login: ScopeLimit,
    /// Signups per client IP.
    #[serde(default = "default_signup")]
    pub signup: ScopeLimit,
    /// Password reset requests per identifier.
    #[serde(default = "default_password_reset")]
    pub password_reset: ScopeLimit,
    /// Generic API calls per user or client address.
    #[serde(default = "default_api")]
    pub api: ScopeLimit,
    /// Guesses against a single reset ticket.
    #[serde(default = "default_reset_token")]
    pub reset_token: ScopeLimit,
    /// MFA code submissions per user.
    #[serde(default = "default_mfa_verify")]
    pub mfa_verify: ScopeLimit,
    /// Email codes sent per user.
    #[serde(default = "default_email_code")]
    pub email_code: ScopeLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            login: default_login(),
            signup: default_signup(),
            password_reset: default_password_reset(),
            api: default_api(),
            reset_token: default_reset_token(),
            mfa_verify: default_mfa_verify(),
            email_code: default_email_code(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

fn default_login() -> ScopeLimit {
    ScopeLimit::new(5, 60)
}

fn default_signup() -> ScopeLimit {
    ScopeLimit::new(5, 3_600)
}

fn default_password_reset() -> ScopeLimit {
    ScopeLimit::new(3, 86_400)
}

fn default_api() -> ScopeLimit {
    ScopeLimit::new(120, 60)
}

fn default_reset_token() -> ScopeLimit {
    ScopeLimit::new(3, 900)
}

fn default_mfa_verify() -> ScopeLimit {
    ScopeLimit::new(5, 300)
}

fn default_email_code() -> ScopeLimit {
    ScopeLimit::new(3, 600)
}
