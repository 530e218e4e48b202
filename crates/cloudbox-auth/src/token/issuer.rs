//! Mints access and refresh tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use cloudbox_core::clock::Clock;
use cloudbox_core::config::AuthConfig;
use cloudbox_core::traits::store::RevocationStore;

use crate::error::AuthResult;
use crate::jwt::claims::{REMEMBER_ME_THRESHOLD_HOURS, new_token_id};
use crate::jwt::{Claims, TokenCodec, TokenType};

use super::family;
use super::revocation::Revocations;

/// A signed token together with the claims it carries.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Compact token string.
    pub token: String,
    /// Claims encoded in `token`.
    pub claims: Claims,
}

impl IssuedToken {
    /// Expiry of the token.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.claims.expires_at()
    }
}

/// Access + refresh pair handed to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Refresh token for the next rotation.
    pub refresh_token: String,
    /// Access token expiration timestamp.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiration timestamp.
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenPair {
    /// Builds the client-facing pair from two issued tokens.
    pub fn new(access: IssuedToken, refresh: IssuedToken) -> Self {
        Self {
            access_expires_at: access.expires_at(),
            refresh_expires_at: refresh.expires_at(),
            access_token: access.token,
            refresh_token: refresh.token,
        }
    }
}

/// Creates signed tokens and records the state later checks depend on.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: Arc<TokenCodec>,
    store: Arc<dyn RevocationStore>,
    revocations: Arc<Revocations>,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl TokenIssuer {
    /// Creates a new issuer.
    pub fn new(
        codec: Arc<TokenCodec>,
        store: Arc<dyn RevocationStore>,
        revocations: Arc<Revocations>,
        clock: Arc<dyn Clock>,
        config: AuthConfig,
    ) -> Self {
        Self {
            codec,
            store,
            revocations,
            clock,
            config,
        }
    }

    /// Issue an access token and record it as the user's latest.
    pub async fn issue_access_token(
        &self,
        user_id: Uuid,
        ttl: chrono::Duration,
    ) -> AuthResult<IssuedToken> {
        let epoch = self.revocations.epoch_for_issuance(user_id).await?;
        let issued = self.mint(user_id, TokenType::Access, ttl, None, epoch)?;
        self.revocations
            .record_latest_access(user_id, &issued.claims)
            .await?;
        Ok(issued)
    }

    /// Issue a refresh token.
    ///
    /// Without a family a new one is opened with this token as its current
    /// member. With a family only the token bytes are minted; moving the
    /// family pointer is the rotation tracker's job.
    pub async fn issue_refresh_token(
        &self,
        user_id: Uuid,
        ttl: chrono::Duration,
        existing_family: Option<Uuid>,
    ) -> AuthResult<IssuedToken> {
        let epoch = self.revocations.epoch_for_issuance(user_id).await?;
        match existing_family {
            Some(family_id) => self.mint(user_id, TokenType::Refresh, ttl, Some(family_id), epoch),
            None => {
                let family_id = Uuid::new_v4();
                let issued = self.mint(user_id, TokenType::Refresh, ttl, Some(family_id), epoch)?;
                let family_ttl = issued.claims.remaining_at(self.clock.now_millis());
                family::open(self.store.as_ref(), family_id, &issued.claims.jti, family_ttl)
                    .await?;
                debug!(user_id = %user_id, family_id = %family_id, "Opened refresh family");
                Ok(issued)
            }
        }
    }

    /// Issue a fresh pair that starts a new refresh family.
    pub async fn issue_pair(&self, user_id: Uuid, remember_me: bool) -> AuthResult<TokenPair> {
        let access = self
            .issue_access_token(user_id, self.config.access_ttl())
            .await?;
        let refresh = self
            .issue_refresh_token(user_id, self.config.refresh_ttl(remember_me), None)
            .await?;
        Ok(TokenPair::new(access, refresh))
    }

    /// Auth configuration this issuer was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    fn mint(
        &self,
        user_id: Uuid,
        token_type: TokenType,
        ttl: chrono::Duration,
        family: Option<Uuid>,
        epoch: u64,
    ) -> AuthResult<IssuedToken> {
        let now = self.clock.now();
        let claims = Claims {
            sub: user_id,
            jti: new_token_id(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            token_type,
            family,
            remember_me: ttl > chrono::Duration::hours(REMEMBER_ME_THRESHOLD_HOURS),
            epoch,
        };
        let token = self.codec.encode(&claims)?;
        Ok(IssuedToken { token, claims })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::Harness;
    use crate::token::family::FamilyState;

    use super::*;

    #[tokio::test]
    async fn test_fresh_refresh_token_opens_family() {
        let h = Harness::new();
        let user = uuid::Uuid::new_v4();
        let refresh = h
            .issuer
            .issue_refresh_token(user, chrono::Duration::hours(24), None)
            .await
            .unwrap();
        let family_id = refresh.claims.family.unwrap();
        assert_eq!(
            FamilyState::load(h.store.as_ref(), family_id).await.unwrap(),
            FamilyState::Active(refresh.claims.jti.clone())
        );
        assert!(!refresh.claims.remember_me);
    }

    #[tokio::test]
    async fn test_minting_into_existing_family_leaves_pointer() {
        let h = Harness::new();
        let user = uuid::Uuid::new_v4();
        let first = h
            .issuer
            .issue_refresh_token(user, chrono::Duration::hours(24), None)
            .await
            .unwrap();
        let family_id = first.claims.family.unwrap();
        let second = h
            .issuer
            .issue_refresh_token(user, chrono::Duration::days(30), Some(family_id))
            .await
            .unwrap();
        assert_eq!(second.claims.family, Some(family_id));
        assert!(second.claims.remember_me);
        assert_eq!(
            FamilyState::load(h.store.as_ref(), family_id).await.unwrap(),
            FamilyState::Active(first.claims.jti)
        );
    }

    #[tokio::test]
    async fn test_access_token_recorded_as_latest() {
        let h = Harness::new();
        let user = uuid::Uuid::new_v4();
        let access = h
            .issuer
            .issue_access_token(user, chrono::Duration::minutes(15))
            .await
            .unwrap();
        h.revocations.revoke_latest_access(user).await.unwrap();
        assert!(h.revocations.is_blacklisted(&access.claims.jti).await.unwrap());
    }
}
