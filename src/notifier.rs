//! Code delivery used when no mail transport is configured.

use async_trait::async_trait;
use uuid::Uuid;

use cloudbox_core::result::AppResult;
use cloudbox_core::traits::notifier::{CodePurpose, CodeSender};

/// Records each dispatch in the log. The code itself is never logged.
#[derive(Debug, Default)]
pub struct TracingCodeSender;

#[async_trait]
impl CodeSender for TracingCodeSender {
    async fn send_code(&self, user_id: Uuid, purpose: CodePurpose, _code: &str) -> AppResult<()> {
        tracing::info!(user_id = %user_id, purpose = ?purpose, "One-time code dispatched");
        Ok(())
    }
}
