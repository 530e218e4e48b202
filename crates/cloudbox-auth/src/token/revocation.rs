//! Early revocation: blacklist entries, the per-user latest access token,
//! and the per-user session epoch used for global sign-out.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};
use uuid::Uuid;

use cloudbox_cache::keys;
use cloudbox_core::clock::Clock;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::store::RevocationStore;

use crate::jwt::Claims;

/// Revocation bookkeeping over the shared store.
#[derive(Debug, Clone)]
pub struct Revocations {
    store: Arc<dyn RevocationStore>,
    clock: Arc<dyn Clock>,
    /// Longest lifetime any refresh token can have; bounds the epoch key.
    max_token_ttl: Duration,
}

impl Revocations {
    /// Creates the revocation service.
    pub fn new(
        store: Arc<dyn RevocationStore>,
        clock: Arc<dyn Clock>,
        max_token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            max_token_ttl,
        }
    }

    /// Blacklist a token id until `expires_at_secs`.
    ///
    /// The entry lives exactly as long as the token would have. A token that
    /// has already expired needs no entry and none is written.
    pub async fn blacklist(&self, jti: &str, expires_at_secs: i64) -> AppResult<()> {
        let remaining_ms = expires_at_secs
            .saturating_mul(1000)
            .saturating_sub(self.clock.now_millis());
        if remaining_ms <= 0 {
            debug!("Skipping blacklist entry for an already expired token");
            return Ok(());
        }
        self.store
            .set(
                &keys::blacklist(jti),
                "1",
                Duration::from_millis(remaining_ms as u64),
            )
            .await
    }

    /// Blacklist the token described by `claims`.
    pub async fn blacklist_claims(&self, claims: &Claims) -> AppResult<()> {
        self.blacklist(&claims.jti, claims.exp).await
    }

    /// Whether a token id has been blacklisted.
    pub async fn is_blacklisted(&self, jti: &str) -> AppResult<bool> {
        self.store.exists(&keys::blacklist(jti)).await
    }

    /// Remember the most recently issued access token of a user.
    pub async fn record_latest_access(&self, user_id: Uuid, claims: &Claims) -> AppResult<()> {
        let ttl = claims.remaining_at(self.clock.now_millis());
        if ttl.is_zero() {
            return Ok(());
        }
        self.store
            .set(
                &keys::user_latest_access(user_id),
                &format!("{}|{}", claims.jti, claims.exp),
                ttl,
            )
            .await
    }

    /// Blacklist the user's latest access token, if it is still alive.
    pub async fn revoke_latest_access(&self, user_id: Uuid) -> AppResult<()> {
        let Some(value) = self.store.get(&keys::user_latest_access(user_id)).await? else {
            return Ok(());
        };
        let Some((jti, exp)) = value
            .split_once('|')
            .and_then(|(jti, exp)| exp.parse::<i64>().ok().map(|exp| (jti, exp)))
        else {
            return Ok(());
        };
        self.blacklist(jti, exp).await?;
        debug!(user_id = %user_id, "Latest access token blacklisted");
        Ok(())
    }

    /// Current session epoch of a user (0 when never bumped).
    pub async fn current_epoch(&self, user_id: Uuid) -> AppResult<u64> {
        Ok(self
            .store
            .get(&keys::user_epoch(user_id))
            .await?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Epoch to stamp into a token being issued now.
    ///
    /// Extends the epoch key so it outlives every token carrying it.
    pub async fn epoch_for_issuance(&self, user_id: Uuid) -> AppResult<u64> {
        let epoch = self.current_epoch(user_id).await?;
        if epoch > 0 {
            self.store
                .expire(&keys::user_epoch(user_id), self.max_token_ttl)
                .await?;
        }
        Ok(epoch)
    }

    /// Invalidate every token issued to the user so far.
    pub async fn bump_epoch(&self, user_id: Uuid) -> AppResult<u64> {
        let key = keys::user_epoch(user_id);
        let counted = self.store.incr_window(&key, self.max_token_ttl).await?;
        self.store.expire(&key, self.max_token_ttl).await?;
        info!(user_id = %user_id, epoch = counted.count, "Session epoch advanced");
        Ok(counted.count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use cloudbox_cache::memory::MemoryRevocationStore;
    use cloudbox_core::clock::ManualClock;

    use super::*;
    use crate::jwt::TokenType;

    fn setup() -> (Revocations, Arc<MemoryRevocationStore>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        let store = Arc::new(MemoryRevocationStore::new(clock.clone()));
        let revocations = Revocations::new(
            store.clone(),
            clock.clone(),
            Duration::from_secs(30 * 86_400),
        );
        (revocations, store, clock)
    }

    #[tokio::test]
    async fn test_blacklist_entry_lives_exactly_as_long_as_token() {
        let (revocations, store, clock) = setup();
        revocations.blacklist("jti-a", 1_700_000_010).await.unwrap();
        assert_eq!(
            store.ttl(&keys::blacklist("jti-a")).await.unwrap(),
            Some(Duration::from_secs(10))
        );

        clock.advance(Duration::from_millis(9_999));
        assert!(revocations.is_blacklisted("jti-a").await.unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(!revocations.is_blacklisted("jti-a").await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_token_is_not_blacklisted() {
        let (revocations, store, _) = setup();
        revocations.blacklist("old", 1_699_999_999).await.unwrap();
        revocations.blacklist("now", 1_700_000_000).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_revoke_latest_access() {
        let (revocations, _, _) = setup();
        let user = Uuid::new_v4();
        let claims = Claims {
            sub: user,
            jti: "latest".into(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
            token_type: TokenType::Access,
            family: None,
            remember_me: false,
            epoch: 0,
        };
        revocations.record_latest_access(user, &claims).await.unwrap();
        revocations.revoke_latest_access(user).await.unwrap();
        assert!(revocations.is_blacklisted("latest").await.unwrap());
        revocations.revoke_latest_access(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn test_epoch_bumps_monotonically() {
        let (revocations, _, _) = setup();
        let user = Uuid::new_v4();
        assert_eq!(revocations.current_epoch(user).await.unwrap(), 0);
        assert_eq!(revocations.bump_epoch(user).await.unwrap(), 1);
        assert_eq!(revocations.bump_epoch(user).await.unwrap(), 2);
        assert_eq!(revocations.epoch_for_issuance(user).await.unwrap(), 2);
    }
}
