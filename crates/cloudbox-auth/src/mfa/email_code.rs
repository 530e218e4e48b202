//! One-time email codes.
//!
//! One outstanding code per user. Issuing overwrites the previous code. A
//! matching verification consumes it; a wrong guess leaves it in place.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use cloudbox_cache::keys;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::store::RevocationStore;

use super::totp::DIGITS;

/// Issues and redeems short-lived numeric codes.
#[derive(Debug, Clone)]
pub struct EmailCodes {
    store: Arc<dyn RevocationStore>,
    ttl: Duration,
}

impl EmailCodes {
    /// Creates the code slot manager.
    pub fn new(store: Arc<dyn RevocationStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Store a new code for the user and return it.
    pub async fn issue(&self, user_id: Uuid) -> AppResult<String> {
        let code = generate_code();
        self.store
            .set(&keys::mfa_email_code(user_id), &code, self.ttl)
            .await?;
        Ok(code)
    }

    /// Redeem a code. `true` only when it matches the stored one.
    pub async fn verify(&self, user_id: Uuid, code: &str) -> AppResult<bool> {
        if code.len() != DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        self.store
            .take_if_equals(&keys::mfa_email_code(user_id), code)
            .await
    }
}

/// Uniform six-digit code, zero padded.
pub fn generate_code() -> String {
    format!("{:06}", rand::random_range(0..1_000_000u32))
}
