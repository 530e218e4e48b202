//! Read-only token validation.
//!
//! Checks run in a fixed order and stop at the first failure:
//! signature, blacklist, session epoch, expiry, and for refresh tokens the
//! owning family. A store failure denies the token.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use cloudbox_core::error::AppError;
use cloudbox_core::traits::store::RevocationStore;

use crate::error::AuthError;
use crate::jwt::{Claims, DecodeError, TokenCodec, TokenType};

use super::family::FamilyState;
use super::revocation::Revocations;

/// Why a token was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Malformed, bad signature, or the wrong token type.
    Invalid,
    /// Past its expiry, or its refresh family has ended.
    Expired,
    /// Revoked explicitly or by a session epoch bump.
    Blacklisted,
    /// Its refresh family was flagged after reuse.
    FamilyCompromised,
    /// The revocation store could not be consulted.
    StoreUnavailable,
}

impl DenialReason {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Expired => "expired",
            Self::Blacklisted => "blacklisted",
            Self::FamilyCompromised => "family_compromised",
            Self::StoreUnavailable => "store_unavailable",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DenialReason> for AuthError {
    fn from(reason: DenialReason) -> Self {
        match reason {
            DenialReason::Invalid => Self::InvalidToken,
            DenialReason::Expired => Self::ExpiredToken,
            DenialReason::Blacklisted => Self::Blacklisted,
            DenialReason::FamilyCompromised => Self::FamilyCompromised,
            DenialReason::StoreUnavailable => Self::StoreUnavailable(AppError::cache(
                "Revocation store unavailable during token validation",
            )),
        }
    }
}

/// A token that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedToken {
    /// Decoded claims.
    pub claims: Claims,
}

impl ValidatedToken {
    /// Subject of the token.
    pub fn user_id(&self) -> Uuid {
        self.claims.sub
    }
}

/// Outcome of validation. Denial is an ordinary value, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The token is good.
    Authorized(ValidatedToken),
    /// The token was refused.
    Denied(DenialReason),
}

impl Verdict {
    /// Converts into a `Result` for flows that surface the reason.
    pub fn into_result(self) -> Result<ValidatedToken, DenialReason> {
        match self {
            Self::Authorized(token) => Ok(token),
            Self::Denied(reason) => Err(reason),
        }
    }

    /// The validated token, if any.
    pub fn authorized(self) -> Option<ValidatedToken> {
        self.into_result().ok()
    }
}

/// Validates access and refresh tokens without mutating any state.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    codec: Arc<TokenCodec>,
    store: Arc<dyn RevocationStore>,
    revocations: Arc<Revocations>,
}

impl TokenValidator {
    /// Creates a new validator.
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn RevocationStore>,
        revocations: Arc<Revocations>,
    ) -> Self {
        Self {
            codec,
            store,
            revocations,
        }
    }

    /// Validate a token of any type.
    pub async fn validate(&self, token: &str) -> Verdict {
        self.run(token, None).await
    }

    /// Validate a token that must be of `expected` type.
    pub async fn validate_as(&self, token: &str, expected: TokenType) -> Verdict {
        self.run(token, Some(expected)).await
    }

    async fn run(&self, token: &str, expected: Option<TokenType>) -> Verdict {
        let verdict = self.check(token, expected).await;
        if let Verdict::Denied(reason) = &verdict {
            debug!(reason = %reason, "Token denied");
        }
        verdict
    }

    async fn check(&self, token: &str, expected: Option<TokenType>) -> Verdict {
        let (claims, expired) = match self.codec.decode(token) {
            Ok(claims) => (claims, false),
            Err(DecodeError::Expired(claims)) => (*claims, true),
            Err(DecodeError::Invalid) => return Verdict::Denied(DenialReason::Invalid),
        };

        if expected.is_some_and(|t| t != claims.token_type) {
            return Verdict::Denied(DenialReason::Invalid);
        }
        if claims.token_type == TokenType::Refresh && claims.family.is_none() {
            return Verdict::Denied(DenialReason::Invalid);
        }

        match self.revocations.is_blacklisted(&claims.jti).await {
            Ok(true) => return Verdict::Denied(DenialReason::Blacklisted),
            Ok(false) => {}
            Err(e) => return store_failure(&claims, e),
        }

        match self.revocations.current_epoch(claims.sub).await {
            Ok(current) if claims.epoch < current => {
                return Verdict::Denied(DenialReason::Blacklisted);
            }
            Ok(_) => {}
            Err(e) => return store_failure(&claims, e),
        }

        if expired {
            debug!(user_id = %claims.sub, "Expired token presented");
            return Verdict::Denied(DenialReason::Expired);
        }

        if let Some(family_id) = claims.family.filter(|_| claims.token_type == TokenType::Refresh) {
            match FamilyState::load(self.store.as_ref(), family_id).await {
                Ok(FamilyState::Active(_)) => {}
                Ok(FamilyState::Compromised) => {
                    debug!(user_id = %claims.sub, family_id = %family_id, "Refresh token from compromised family");
                    return Verdict::Denied(DenialReason::FamilyCompromised);
                }
                Ok(FamilyState::Terminated | FamilyState::Missing) => {
                    return Verdict::Denied(DenialReason::Expired);
                }
                Err(e) => return store_failure(&claims, e),
            }
        }

        Verdict::Authorized(ValidatedToken { claims })
    }
}

fn store_failure(claims: &Claims, err: AppError) -> Verdict {
    warn!(user_id = %claims.sub, error = %err, "Revocation store unavailable, denying token");
    Verdict::Denied(DenialReason::StoreUnavailable)
}
