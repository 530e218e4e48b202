//! Authentication configuration.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Shortest accepted signing secret, in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Token lifetimes, signing key, and credential policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Secret key for token signing (HMAC-SHA256). At least 32 bytes.
    pub jwt_secret: String,
    /// Access token TTL in minutes.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_minutes: u64,
    /// Refresh token TTL in hours.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_hours: u64,
    /// Refresh token TTL in days when the client asked to be remembered.
    #[serde(default = "default_remember_me_ttl")]
    pub remember_me_ttl_days: u64,
    /// Minimum password length.
    #[serde(default = "default_password_min")]
    pub password_min_length: usize,
    /// Lifetime of a password reset ticket in minutes.
    #[serde(default = "default_reset_ttl")]
    pub password_reset_ttl_minutes: u64,
}

impl AuthConfig {
    /// Builds a configuration with the given secret and default lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            access_ttl_minutes: default_access_ttl(),
            refresh_ttl_hours: default_refresh_ttl(),
            remember_me_ttl_days: default_remember_me_ttl(),
            password_min_length: default_password_min(),
            password_reset_ttl_minutes: default_reset_ttl(),
        }
    }

    /// Reject a missing or short signing secret.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(AppError::configuration(format!(
                "auth.jwt_secret must be at least {MIN_JWT_SECRET_LEN} bytes"
            )));
        }
        Ok(())
    }

    /// Access token lifetime.
    pub fn access_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.access_ttl_minutes as i64)
    }

    /// Refresh token lifetime, extended when `remember_me` is set.
    pub fn refresh_ttl(&self, remember_me: bool) -> chrono::Duration {
        if remember_me {
            chrono::Duration::days(self.remember_me_ttl_days as i64)
        } else {
            chrono::Duration::hours(self.refresh_ttl_hours as i64)
        }
    }

    /// The longest lifetime any refresh token can have.
    pub fn max_refresh_ttl(&self) -> chrono::Duration {
        self.refresh_ttl(false).max(self.refresh_ttl(true))
    }
}

fn default_access_ttl() -> u64 {
    15
}

fn default_refresh_ttl() -> u64 {
    24
}

fn default_remember_me_ttl() -> u64 {
    30
}

fn default_password_min() -> usize {
    8
}

fn default_reset_ttl() -> u64 {
    15
}
