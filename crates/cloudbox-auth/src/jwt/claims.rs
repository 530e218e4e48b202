//! Claim set carried by access and refresh tokens.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetimes above this mark a token as issued with "remember me".
pub const REMEMBER_ME_THRESHOLD_HOURS: i64 = 24;

/// Claims embedded in every Cloudbox token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: Uuid,
    /// Token id, 256 random bits encoded as unpadded URL-safe base64.
    pub jti: String,
    /// Issued-at timestamp (seconds since epoch).
    pub iat: i64,
    /// Expiration timestamp (seconds since epoch).
    pub exp: i64,
    /// Access or refresh.
    #[serde(rename = "type")]
    pub token_type: TokenType,
    /// Refresh family. Present on refresh tokens only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<Uuid>,
    /// Set when the token was issued with an extended lifetime.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub remember_me: bool,
    /// Session epoch of the user at issuance.
    #[serde(default)]
    pub epoch: u64,
}

/// Distinguishes access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    /// Short-lived bearer credential for API calls.
    Access,
    /// Credential used only to mint a new pair.
    Refresh,
}

impl TokenType {
    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Claims {
    /// Returns the user ID from the subject claim.
    pub fn user_id(&self) -> Uuid {
        self.sub
    }

    /// Returns the expiration as a `DateTime<Utc>`.
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Expiration in milliseconds since epoch.
    pub fn expires_at_millis(&self) -> i64 {
        self.exp.saturating_mul(1000)
    }

    /// Whether the token is past its expiry at `now_millis`.
    pub fn is_expired_at(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at_millis()
    }

    /// Remaining lifetime at `now_millis`, clamped to zero.
    pub fn remaining_at(&self, now_millis: i64) -> std::time::Duration {
        let left = self.expires_at_millis().saturating_sub(now_millis).max(0);
        std::time::Duration::from_millis(left as u64)
    }
}

/// Generate a fresh token id: 256 bits from the OS-seeded thread RNG.
pub fn new_token_id() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}
