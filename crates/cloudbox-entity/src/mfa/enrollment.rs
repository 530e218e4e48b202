//! TOTP enrollment model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's TOTP enrollment. One row per user.
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct MfaEnrollment {
    /// Owning user.
    pub user_id: Uuid,
    /// Base32-encoded shared secret.
    #[serde(skip_serializing)]
    pub secret: String,
    /// Whether the enrollment has been confirmed and is enforced at login.
    pub enabled: bool,
    /// When the user confirmed the secret with a valid code.
    pub verified_at: Option<DateTime<Utc>>,
    /// When the secret was generated.
    pub created_at: DateTime<Utc>,
}

impl MfaEnrollment {
    /// Creates a pending (unconfirmed) enrollment.
    pub fn pending(user_id: Uuid, secret: String, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            secret,
            enabled: false,
            verified_at: None,
            created_at: now,
        }
    }

    /// Marks the enrollment as confirmed.
    pub fn confirm(&mut self, now: DateTime<Utc>) {
        self.enabled = true;
        self.verified_at = Some(now);
    }
}

impl std::fmt::Debug for MfaEnrollment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MfaEnrollment")
            .field("user_id", &self.user_id)
            .field("secret", &"[REDACTED]")
            .field("enabled", &self.enabled)
            .field("verified_at", &self.verified_at)
            .finish()
    }
}
