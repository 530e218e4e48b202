//! Refresh rotation with reuse detection.
//!
//! Each refresh token can be redeemed once. Redemption moves the family
//! pointer from the presented id to the new one with a single
//! compare-and-swap; any request that loses that swap, or presents a token
//! the pointer has already moved past, is treated as replay and ends the
//! whole family.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use cloudbox_cache::keys;
use cloudbox_core::clock::Clock;
use cloudbox_core::traits::store::{CompareAndSwapOutcome, RevocationStore};

use crate::error::{AuthError, AuthResult};
use crate::jwt::TokenType;

use super::family::{self, COMPROMISED, FamilyState, TERMINATED};
use super::issuer::{TokenIssuer, TokenPair};
use super::revocation::Revocations;
use super::validator::TokenValidator;

/// Owns the refresh family pointers.
#[derive(Debug, Clone)]
pub struct RotationTracker {
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    revocations: Arc<Revocations>,
    store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
}

impl RotationTracker {
    /// Creates a new rotation tracker.
    pub fn new(
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
        revocations: Arc<Revocations>,
        store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer,
            validator,
            revocations,
            store,
            clock,
        }
    }

    /// Redeem a refresh token for a new access + refresh pair.
    ///
    /// At most one caller ever receives a pair for a given refresh token.
    pub async fn rotate(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let presented = self
            .validator
            .validate_as(refresh_token, TokenType::Refresh)
            .await
            .into_result()?
            .claims;
        let family_id = presented.family.ok_or(AuthError::InvalidToken)?;
        let user_id = presented.sub;

        let ttl = self.issuer.config().refresh_ttl(presented.remember_me);
        let next = self
            .issuer
            .issue_refresh_token(user_id, ttl, Some(family_id))
            .await?;

        // The family now lives as long as its newest member.
        let family_ttl = next.claims.remaining_at(self.clock.now_millis());
        let outcome = self
            .store
            .compare_and_swap(
                &keys::family(family_id),
                &presented.jti,
                &next.claims.jti,
                Some(family_ttl),
            )
            .await?;

        match outcome {
            CompareAndSwapOutcome::Updated => {
                let access = self
                    .issuer
                    .issue_access_token(user_id, self.issuer.config().access_ttl())
                    .await?;
                // A replay that lost the swap may have compromised the family
                // before `access` was recorded as latest, revoking an older token.
                if FamilyState::load(self.store.as_ref(), family_id).await?
                    == FamilyState::Compromised
                {
                    self.revocations.blacklist_claims(&access.claims).await?;
                    warn!(
                        user_id = %user_id,
                        family_id = %family_id,
                        "Family compromised during rotation, discarding new tokens"
                    );
                    return Err(AuthError::FamilyCompromised);
                }
                info!(user_id = %user_id, family_id = %family_id, "Refresh token rotated");
                Ok(TokenPair::new(access, next))
            }
            CompareAndSwapOutcome::Mismatch(current) if current == COMPROMISED => {
                Err(AuthError::FamilyCompromised)
            }
            CompareAndSwapOutcome::Mismatch(current) if current == TERMINATED => {
                Err(AuthError::ExpiredToken)
            }
            CompareAndSwapOutcome::Mismatch(_) => {
                self.on_reuse(user_id, family_id).await?;
                Err(AuthError::FamilyCompromised)
            }
            CompareAndSwapOutcome::Missing => Err(AuthError::ExpiredToken),
        }
    }

    async fn on_reuse(&self, user_id: Uuid, family_id: Uuid) -> AuthResult<()> {
        warn!(
            user_id = %user_id,
            family_id = %family_id,
            "Refresh token reuse detected, compromising family"
        );
        family::mark_compromised(self.store.as_ref(), family_id).await?;
        self.revocations.revoke_latest_access(user_id).await?;
        Ok(())
    }
}
