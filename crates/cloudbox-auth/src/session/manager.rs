//! Session lifecycle: login, signup, refresh, logout, password change and
//! password reset.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use cloudbox_cache::keys;
use cloudbox_core::clock::Clock;
use cloudbox_core::config::AuthConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::traits::notifier::{CodePurpose, CodeSender};
use cloudbox_core::traits::store::RevocationStore;
use cloudbox_database::repositories::UserDirectory;
use cloudbox_entity::user::{NewUser, User, UserRole};

use crate::error::{AuthError, AuthResult};
use crate::jwt::claims::new_token_id;
use crate::jwt::{Claims, DecodeError, TokenCodec, TokenType};
use crate::mfa::MfaVerifier;
use crate::mfa::email_code::generate_code;
use crate::password::{PasswordHasher, PasswordPolicy};
use crate::rate_limit::{RateLimiter, RateScope};
use crate::token::{Revocations, RotationTracker, TokenIssuer, TokenPair, family};

/// A signed-in user and their tokens.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    /// The authenticated user.
    pub user: User,
    /// Freshly issued tokens.
    pub tokens: TokenPair,
}

/// Input for account creation.
#[derive(Debug, Clone, Deserialize)]
pub struct SignupRequest {
    /// Desired login name.
    pub username: String,
    /// Optional email address.
    pub email: Option<String>,
    /// Plaintext password.
    pub password: String,
    /// Optional display name.
    pub display_name: Option<String>,
}

/// Stored under `reset:{id}` while a password reset is pending.
#[derive(Debug, Serialize, Deserialize)]
struct ResetTicket {
    user_id: Uuid,
    code: String,
}

/// Orchestrates the user-facing authentication flows.
#[derive(Debug, Clone)]
pub struct SessionManager {
    directory: Arc<dyn UserDirectory>,
    hasher: Arc<PasswordHasher>,
    policy: PasswordPolicy,
    codec: Arc<TokenCodec>,
    issuer: Arc<TokenIssuer>,
    rotation: Arc<RotationTracker>,
    revocations: Arc<Revocations>,
    limiter: Arc<RateLimiter>,
    mfa: Arc<MfaVerifier>,
    store: Arc<dyn RevocationStore>,
    sender: Arc<dyn CodeSender>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl SessionManager {
    /// Creates a new session manager with all required dependencies.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        hasher: Arc<PasswordHasher>,
        codec: Arc<TokenCodec>,
        issuer: Arc<TokenIssuer>,
        rotation: Arc<RotationTracker>,
        revocations: Arc<Revocations>,
        limiter: Arc<RateLimiter>,
        mfa: Arc<MfaVerifier>,
        store: Arc<dyn RevocationStore>,
        sender: Arc<dyn CodeSender>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            policy: PasswordPolicy::new(&config),
            directory,
            hasher,
            codec,
            issuer,
            rotation,
            revocations,
            limiter,
            mfa,
            store,
            sender,
            clock,
            config,
        }
    }

    /// Performs the login flow:
    ///
    /// 1. Rate limit by identifier
    /// 2. Verify credentials and account status
    /// 3. Verify the TOTP code when MFA is on
    /// 4. Forgive earlier failures and issue a new token family
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        totp_code: Option<&str>,
        remember_me: bool,
    ) -> AuthResult<AuthSession> {
        let identifier = identifier.trim();
        let limiter_key = identifier.to_lowercase();
        self.limiter.enforce(RateScope::Login, &limiter_key).await?;

        let Some(user) = self.directory.find_by_identifier(identifier).await? else {
            warn!("Login failed: unknown identifier");
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash.as_deref() else {
            warn!(user_id = %user.id, "Login failed: account has no password");
            return Err(AuthError::InvalidCredentials);
        };
        if !self.hasher.verify_password(password, hash)? {
            warn!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }
        if !user.can_login(self.clock.now()) {
            warn!(user_id = %user.id, status = ?user.status, "Login refused for inactive account");
            return Err(AuthError::AccountDisabled);
        }

        if self.mfa.is_enabled(user.id).await? {
            let code = totp_code.ok_or(AuthError::MfaRequired)?;
            self.mfa.verify_login_code(user.id, code).await?;
        }

        self.limiter.reset(RateScope::Login, &limiter_key).await;
        self.record_login(user.id).await;

        let tokens = self.issuer.issue_pair(user.id, remember_me).await?;
        info!(user_id = %user.id, remember_me, "Login successful");
        Ok(AuthSession { user, tokens })
    }

    /// Create an account and sign it in.
    pub async fn signup(&self, request: SignupRequest, client_ip: &str) -> AuthResult<AuthSession> {
        self.limiter.enforce(RateScope::Signup, client_ip).await?;

        let username = request.username.trim().to_string();
        validate_username(&username)?;
        let email = request
            .email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty());
        if let Some(email) = &email {
            validate_email(email)?;
        }
        self.policy.validate(&request.password)?;

        let password_hash = self.hasher.hash_password(&request.password)?;
        let user = self
            .directory
            .create_user(&NewUser {
                username,
                email,
                password_hash: Some(password_hash),
                display_name: request.display_name,
                role: UserRole::Member,
            })
            .await?;

        let tokens = self.issuer.issue_pair(user.id, false).await?;
        info!(user_id = %user.id, "Account created");
        Ok(AuthSession { user, tokens })
    }

    /// Issue tokens for an identity an external provider already verified.
    pub async fn social_login(&self, user_id: Uuid, remember_me: bool) -> AuthResult<AuthSession> {
        let user = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if !user.can_login(self.clock.now()) {
            return Err(AuthError::AccountDisabled);
        }

        self.record_login(user.id).await;
        let tokens = self.issuer.issue_pair(user.id, remember_me).await?;
        info!(user_id = %user.id, "Social login successful");
        Ok(AuthSession { user, tokens })
    }

    /// Redeem a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        self.rotation.rotate(refresh_token).await
    }

    /// End a session.
    ///
    /// The access token is blacklisted. The refresh token's family is
    /// terminated when the token is authentic and belongs to the same user;
    /// an expired refresh token still identifies its family.
    pub async fn logout(&self, access: &Claims, refresh_token: Option<&str>) -> AuthResult<()> {
        self.revocations.blacklist_claims(access).await?;

        if let Some(token) = refresh_token {
            let refresh = match self.codec.decode(token) {
                Ok(claims) => Some(claims),
                Err(DecodeError::Expired(claims)) => Some(*claims),
                Err(DecodeError::Invalid) => None,
            };
            match refresh {
                Some(claims)
                    if claims.sub == access.sub && claims.token_type == TokenType::Refresh =>
                {
                    if let Some(family_id) = claims.family {
                        family::terminate(self.store.as_ref(), family_id).await?;
                    }
                }
                _ => warn!(user_id = %access.sub, "Ignoring unusable refresh token on logout"),
            }
        }

        info!(user_id = %access.sub, "Logout successful");
        Ok(())
    }

    /// Change the password and sign out every other session.
    ///
    /// Returns a new token pair so the caller stays signed in.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: &str,
    ) -> AuthResult<TokenPair> {
        let user = self
            .directory
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.hasher.verify_password(current_password, hash)? {
            warn!(user_id = %user_id, "Password change refused: wrong current password");
            return Err(AuthError::InvalidCredentials);
        }
        self.policy.validate_not_same(current_password, new_password)?;
        self.policy.validate(new_password)?;

        let new_hash = self.hasher.hash_password(new_password)?;
        self.directory.update_password(user_id, &new_hash).await?;
        self.sign_out_everywhere(user_id).await?;
        info!(user_id = %user_id, "Password changed");

        self.issuer.issue_pair(user_id, false).await
    }

    /// Start a password reset. Returns the reset ticket id.
    ///
    /// Unknown identifiers get a ticket id too, so callers cannot probe for
    /// accounts.
    pub async fn request_password_reset(&self, identifier: &str) -> AuthResult<String> {
        let identifier = identifier.trim();
        self.limiter
            .enforce(RateScope::PasswordReset, &identifier.to_lowercase())
            .await?;

        let reset_id = new_token_id();
        let Some(user) = self.directory.find_by_identifier(identifier).await? else {
            info!("Password reset requested for unknown identifier");
            return Ok(reset_id);
        };

        let ticket = ResetTicket {
            user_id: user.id,
            code: generate_code(),
        };
        let value = serde_json::to_string(&ticket)
            .map_err(|e| AppError::internal(format!("Failed to encode reset ticket: {e}")))?;
        self.store
            .set(&keys::password_reset(&reset_id), &value, self.reset_ttl())
            .await?;
        self.sender
            .send_code(user.id, CodePurpose::PasswordReset, &ticket.code)
            .await?;

        info!(user_id = %user.id, "Password reset issued");
        Ok(reset_id)
    }

    /// Complete a password reset and sign the user out everywhere.
    pub async fn confirm_password_reset(
        &self,
        reset_id: &str,
        code: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        self.limiter.enforce(RateScope::ResetToken, reset_id).await?;

        let key = keys::password_reset(reset_id);
        let Some(stored) = self.store.get(&key).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        let ticket: ResetTicket = serde_json::from_str(&stored)
            .map_err(|e| AppError::internal(format!("Corrupt reset ticket: {e}")))?;
        if !bool::from(ticket.code.as_bytes().ct_eq(code.as_bytes())) {
            warn!(user_id = %ticket.user_id, "Password reset refused: wrong code");
            return Err(AuthError::InvalidCredentials);
        }
        self.policy.validate(new_password)?;

        // Consume before changing anything so a ticket is only ever used once.
        if !self.store.take_if_equals(&key, &stored).await? {
            return Err(AuthError::InvalidCredentials);
        }

        let new_hash = self.hasher.hash_password(new_password)?;
        self.directory
            .update_password(ticket.user_id, &new_hash)
            .await?;
        self.sign_out_everywhere(ticket.user_id).await?;
        info!(user_id = %ticket.user_id, "Password reset completed");
        Ok(())
    }

    async fn sign_out_everywhere(&self, user_id: Uuid) -> AuthResult<()> {
        self.revocations.revoke_latest_access(user_id).await?;
        self.revocations.bump_epoch(user_id).await?;
        Ok(())
    }

    async fn record_login(&self, user_id: Uuid) {
        if let Err(e) = self.directory.record_login(user_id).await {
            warn!(user_id = %user_id, error = %e, "Failed to record login time");
        }
    }

    fn reset_ttl(&self) -> Duration {
        Duration::from_secs(self.config.password_reset_ttl_minutes.saturating_mul(60))
    }
}

fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(3..=32).contains(&len) {
        return Err(AuthError::Validation(
            "Username must be 3-32 characters".to_string(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(AuthError::Validation(
            "Username can only contain letters, digits, '_', '-' and '.'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> AuthResult<()> {
    if email.validate_email() {
        Ok(())
    } else {
        Err(AuthError::Validation("Invalid email address".to_string()))
    }
}
