//! Outbound delivery of one-time codes.

use async_trait::async_trait;
use uuid::Uuid;

use crate::result::AppResult;

/// Why a code is being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodePurpose {
    /// Second-factor email code.
    EmailVerification,
    /// Password reset confirmation code.
    PasswordReset,
}

/// Delivers codes to users (email, SMS, ...). Rendering and transport are
/// the implementor's concern.
#[async_trait]
pub trait CodeSender: Send + Sync + std::fmt::Debug + 'static {
    /// Send `code` to the user for the given purpose.
    async fn send_code(&self, user_id: Uuid, purpose: CodePurpose, code: &str) -> AppResult<()>;
}
