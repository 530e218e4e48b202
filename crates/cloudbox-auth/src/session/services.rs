//! Wiring of every authentication component from configuration.

use std::sync::Arc;

use cloudbox_core::clock::Clock;
use cloudbox_core::config::AppConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::traits::notifier::CodeSender;
use cloudbox_core::traits::store::RevocationStore;
use cloudbox_database::repositories::{MfaRepository, UserDirectory};

use crate::gate::{AuthenticationGate, PublicPaths};
use crate::jwt::TokenCodec;
use crate::mfa::MfaVerifier;
use crate::password::PasswordHasher;
use crate::rate_limit::RateLimiter;
use crate::token::{Revocations, RotationTracker, TokenIssuer, TokenValidator};

use super::manager::SessionManager;

/// Shared handles to the authentication components.
#[derive(Debug, Clone)]
pub struct AuthServices {
    /// Token codec.
    pub codec: Arc<TokenCodec>,
    /// Blacklist, latest-access and session epoch bookkeeping.
    pub revocations: Arc<Revocations>,
    /// Token issuer.
    pub issuer: Arc<TokenIssuer>,
    /// Token validator.
    pub validator: Arc<TokenValidator>,
    /// Refresh rotation.
    pub rotation: Arc<RotationTracker>,
    /// Rate limiter.
    pub limiter: Arc<RateLimiter>,
    /// MFA verifier.
    pub mfa: Arc<MfaVerifier>,
    /// Request gate.
    pub gate: Arc<AuthenticationGate>,
    /// Session flows.
    pub sessions: Arc<SessionManager>,
}

impl AuthServices {
    /// Builds every component over the given collaborators.
    ///
    /// Fails when the signing secret is too short.
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn UserDirectory>,
        mfa_repo: Arc<dyn MfaRepository>,
        sender: Arc<dyn CodeSender>,
        hasher: PasswordHasher,
    ) -> Result<Self, AppError> {
        let auth = &config.auth;
        let max_token_ttl = auth.max_refresh_ttl().to_std().map_err(|_| {
            AppError::configuration("auth refresh lifetimes must be positive")
        })?;

        let codec = Arc::new(TokenCodec::new(&auth.jwt_secret, Arc::clone(&clock))?);
        let revocations = Arc::new(Revocations::new(
            Arc::clone(&store),
            Arc::clone(&clock),
            max_token_ttl,
        ));
        let issuer = Arc::new(TokenIssuer::new(
            Arc::clone(&codec),
            Arc::clone(&store),
            Arc::clone(&revocations),
            Arc::clone(&clock),
            auth.clone(),
        ));
        let validator = Arc::new(TokenValidator::new(
            Arc::clone(&codec),
            Arc::clone(&store),
            Arc::clone(&revocations),
        ));
        let rotation = Arc::new(RotationTracker::new(
            Arc::clone(&issuer),
            Arc::clone(&validator),
            Arc::clone(&revocations),
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let limiter = Arc::new(RateLimiter::new(
            Arc::clone(&store),
            config.rate_limit.clone(),
        ));
        let mfa = Arc::new(MfaVerifier::new(
            mfa_repo,
            Arc::clone(&store),
            Arc::clone(&sender),
            Arc::clone(&limiter),
            Arc::clone(&clock),
            &config.mfa,
        ));
        let gate = Arc::new(AuthenticationGate::new(
            Arc::clone(&validator),
            Arc::clone(&directory),
            PublicPaths::from_config(&config.gate),
            Arc::clone(&clock),
        ));
        let sessions = Arc::new(SessionManager::new(
            directory,
            Arc::new(hasher),
            Arc::clone(&codec),
            Arc::clone(&issuer),
            Arc::clone(&rotation),
            Arc::clone(&revocations),
            Arc::clone(&limiter),
            Arc::clone(&mfa),
            store,
            sender,
            clock,
            auth.clone(),
        ));

        Ok(Self {
            codec,
            revocations,
            issuer,
            validator,
            rotation,
            limiter,
            mfa,
            gate,
            sessions,
        })
    }
}
