//! MFA enrollment and verification.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use cloudbox_cache::keys;
use cloudbox_core::clock::Clock;
use cloudbox_core::config::MfaConfig;
use cloudbox_core::traits::notifier::{CodePurpose, CodeSender};
use cloudbox_core::traits::store::RevocationStore;
use cloudbox_database::repositories::MfaRepository;
use cloudbox_entity::mfa::MfaEnrollment;

use crate::error::{AuthError, AuthResult};
use crate::rate_limit::{RateLimiter, RateScope};

use super::email_code::EmailCodes;
use super::totp::{DIGITS, TotpEngine};

/// What a client needs to register the secret in an authenticator app.
#[derive(Debug, Clone, Serialize)]
pub struct MfaSetup {
    /// Base32 shared secret.
    pub secret: String,
    /// Issuer label.
    pub issuer: String,
    /// Code length.
    pub digits: usize,
    /// Step length in seconds.
    pub period: u64,
    /// Whether the enrollment is already confirmed.
    pub enabled: bool,
}

/// TOTP enrollment lifecycle and one-time email codes.
#[derive(Debug, Clone)]
pub struct MfaVerifier {
    repo: Arc<dyn MfaRepository>,
    store: Arc<dyn RevocationStore>,
    sender: Arc<dyn CodeSender>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    totp: TotpEngine,
    email_codes: EmailCodes,
    issuer: String,
}

impl MfaVerifier {
    /// Creates a new verifier.
    pub fn new(
        repo: Arc<dyn MfaRepository>,
        store: Arc<dyn RevocationStore>,
        sender: Arc<dyn CodeSender>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        config: &MfaConfig,
    ) -> Self {
        Self {
            email_codes: EmailCodes::new(
                Arc::clone(&store),
                Duration::from_secs(config.email_code_ttl_seconds),
            ),
            totp: TotpEngine::from_config(config),
            issuer: config.issuer.clone(),
            repo,
            store,
            sender,
            limiter,
            clock,
        }
    }

    /// Start (or resume) TOTP enrollment.
    ///
    /// A confirmed enrollment is returned unchanged. A pending one gets a
    /// new secret, since the old one was never proven to reach the user.
    pub async fn enroll(&self, user_id: Uuid) -> AuthResult<MfaSetup> {
        let enrollment = match self.repo.get(user_id).await? {
            Some(existing) if existing.enabled => existing,
            _ => {
                let secret = self.totp.generate_secret()?;
                let pending = MfaEnrollment::pending(user_id, secret, self.clock.now());
                self.repo.save(&pending).await?;
                info!(user_id = %user_id, "TOTP enrollment started");
                pending
            }
        };
        Ok(self.setup_for(enrollment))
    }

    /// Confirm a pending enrollment with a code from the authenticator.
    pub async fn enable(&self, user_id: Uuid, code: &str) -> AuthResult<()> {
        let mut enrollment = self.repo.get(user_id).await?.ok_or(AuthError::MfaNotEnrolled)?;
        self.redeem_totp(user_id, &enrollment.secret, code).await?;
        if !enrollment.enabled {
            enrollment.confirm(self.clock.now());
            self.repo.save(&enrollment).await?;
            info!(user_id = %user_id, "MFA enabled");
        }
        Ok(())
    }

    /// Remove a confirmed enrollment. Requires a current code.
    pub async fn disable(&self, user_id: Uuid, code: &str) -> AuthResult<()> {
        let enrollment = self
            .active_enrollment(user_id)
            .await?
            .ok_or(AuthError::MfaNotEnrolled)?;
        self.redeem_totp(user_id, &enrollment.secret, code).await?;
        self.repo.delete(user_id).await?;
        info!(user_id = %user_id, "MFA disabled");
        Ok(())
    }

    /// Check a code against a secret at the current time. No side effects.
    pub fn verify_totp(&self, secret: &str, code: &str) -> bool {
        self.totp.verify(secret, code, self.unix_now())
    }

    /// Verify the second factor during login.
    pub async fn verify_login_code(&self, user_id: Uuid, code: &str) -> AuthResult<()> {
        let enrollment = self
            .active_enrollment(user_id)
            .await?
            .ok_or(AuthError::MfaNotEnrolled)?;
        self.redeem_totp(user_id, &enrollment.secret, code).await
    }

    /// The user's confirmed enrollment, if MFA is on.
    pub async fn active_enrollment(&self, user_id: Uuid) -> AuthResult<Option<MfaEnrollment>> {
        Ok(self.repo.get(user_id).await?.filter(|e| e.enabled))
    }

    /// Whether login for this user requires a TOTP code.
    pub async fn is_enabled(&self, user_id: Uuid) -> AuthResult<bool> {
        Ok(self.active_enrollment(user_id).await?.is_some())
    }

    /// Issue a fresh email code, replacing any outstanding one, and send it.
    pub async fn issue_email_code(&self, user_id: Uuid) -> AuthResult<String> {
        self.limiter
            .enforce(RateScope::EmailCode, &user_id.to_string())
            .await?;
        let code = self.email_codes.issue(user_id).await?;
        self.sender
            .send_code(user_id, CodePurpose::EmailVerification, &code)
            .await?;
        info!(user_id = %user_id, "Email code issued");
        Ok(code)
    }

    /// Redeem an email code. `true` only on an exact match, which consumes it.
    pub async fn verify_email_code(&self, user_id: Uuid, code: &str) -> AuthResult<bool> {
        self.limiter
            .enforce(RateScope::MfaVerify, &format!("email:{user_id}"))
            .await?;
        let matched = self.email_codes.verify(user_id, code).await?;
        if !matched {
            warn!(user_id = %user_id, "Email code rejected");
        }
        Ok(matched)
    }

    /// Accept a TOTP code at most once per time step.
    async fn redeem_totp(&self, user_id: Uuid, secret: &str, code: &str) -> AuthResult<()> {
        self.limiter
            .enforce(RateScope::MfaVerify, &format!("totp:{user_id}"))
            .await?;

        let Some(step) = self.totp.matching_step(secret, code, self.unix_now()) else {
            warn!(user_id = %user_id, "TOTP code rejected");
            return Err(AuthError::MfaCodeInvalid);
        };

        let fresh = self
            .store
            .set_nx(
                &keys::totp_step_used(user_id, step),
                "1",
                self.totp.acceptance_window(),
            )
            .await?;
        if !fresh {
            warn!(user_id = %user_id, "TOTP code replayed");
            return Err(AuthError::MfaCodeInvalid);
        }
        Ok(())
    }

    fn setup_for(&self, enrollment: MfaEnrollment) -> MfaSetup {
        MfaSetup {
            secret: enrollment.secret,
            issuer: self.issuer.clone(),
            digits: DIGITS,
            period: self.totp.step(),
            enabled: enrollment.enabled,
        }
    }

    fn unix_now(&self) -> u64 {
        u64::try_from(self.clock.now().timestamp()).unwrap_or(0)
    }

    /// The TOTP engine, for callers that need to compute codes.
    pub fn totp(&self) -> &TotpEngine {
        &self.totp
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{Harness, SentCode};

    use super::*;

    fn current_code(h: &Harness, secret: &str) -> String {
        h.mfa
            .totp()
            .code_at(secret, h.clock.now().timestamp() as u64)
            .unwrap()
    }

    #[tokio::test]
    async fn test_enroll_then_enable() {
        let h = Harness::new();
        let user = Uuid::new_v4();

        let setup = h.mfa.enroll(user).await.unwrap();
        assert!(!setup.enabled);
        assert!(!h.mfa.is_enabled(user).await.unwrap());

        let code = current_code(&h, &setup.secret);
        h.mfa.enable(user, &code).await.unwrap();
        assert!(h.mfa.is_enabled(user).await.unwrap());

        let again = h.mfa.enroll(user).await.unwrap();
        assert_eq!(again.secret, setup.secret);
        assert!(again.enabled);
    }

    #[tokio::test]
    async fn test_pending_enrollment_is_regenerated() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let first = h.mfa.enroll(user).await.unwrap();
        let second = h.mfa.enroll(user).await.unwrap();
        assert_ne!(first.secret, second.secret);
    }

    #[tokio::test]
    async fn test_enable_with_wrong_code_fails() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let setup = h.mfa.enroll(user).await.unwrap();
        let code = current_code(&h, &setup.secret);
        let wrong = if code == "000000" { "111111" } else { "000000" };
        assert!(matches!(
            h.mfa.enable(user, wrong).await,
            Err(AuthError::MfaCodeInvalid)
        ));
        assert!(matches!(
            h.mfa.enable(Uuid::new_v4(), &code).await,
            Err(AuthError::MfaNotEnrolled)
        ));
    }

    #[tokio::test]
    async fn test_totp_step_cannot_be_replayed() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let setup = h.mfa.enroll(user).await.unwrap();
        h.mfa
            .enable(user, &current_code(&h, &setup.secret))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(30));
        let code = current_code(&h, &setup.secret);
        h.mfa.verify_login_code(user, &code).await.unwrap();
        assert!(matches!(
            h.mfa.verify_login_code(user, &code).await,
            Err(AuthError::MfaCodeInvalid)
        ));
        assert!(h.mfa.verify_totp(&setup.secret, &code));
    }

    #[tokio::test]
    async fn test_disable_requires_code() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let setup = h.mfa.enroll(user).await.unwrap();
        h.mfa
            .enable(user, &current_code(&h, &setup.secret))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(30));
        h.mfa
            .disable(user, &current_code(&h, &setup.secret))
            .await
            .unwrap();
        assert!(!h.mfa.is_enabled(user).await.unwrap());
    }

    #[tokio::test]
    async fn test_email_code_one_shot_and_delivered() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        let code = h.mfa.issue_email_code(user).await.unwrap();
        assert_eq!(
            h.sender.sent(),
            vec![SentCode {
                user_id: user,
                purpose: CodePurpose::EmailVerification,
                code: code.clone(),
            }]
        );
        assert!(h.mfa.verify_email_code(user, &code).await.unwrap());
        assert!(!h.mfa.verify_email_code(user, &code).await.unwrap());
    }

    #[tokio::test]
    async fn test_email_code_issuance_is_rate_limited() {
        let h = Harness::new();
        let user = Uuid::new_v4();
        for _ in 0..3 {
            h.mfa.issue_email_code(user).await.unwrap();
        }
        assert!(matches!(
            h.mfa.issue_email_code(user).await,
            Err(AuthError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_email_code_attempts_are_throttled() {
        let h = Harness::new();
        let user = Uuid::new_v4();

        // Attempts count even when no code is outstanding.
        for _ in 0..5 {
            assert!(!h.mfa.verify_email_code(user, "000000").await.unwrap());
        }
        assert!(matches!(
            h.mfa.verify_email_code(user, "000000").await,
            Err(AuthError::RateLimited { .. })
        ));

        h.clock.advance(std::time::Duration::from_secs(301));
        assert!(!h.mfa.verify_email_code(user, "000000").await.unwrap());
    }
}
