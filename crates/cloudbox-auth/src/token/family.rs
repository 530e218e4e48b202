//! Refresh family pointer encoding.
//!
//! `family:{id}` holds the id of the one refresh token currently eligible
//! for rotation, or a terminal marker. The key's TTL is the family's
//! expiry; a missing key means the family has fully expired.

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use cloudbox_cache::keys;
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::store::{CompareAndSwapOutcome, RevocationStore};

// Token ids are base64url and never start with `!`.

/// Marker for a family killed by reuse detection. Terminal.
pub const COMPROMISED: &str = "!compromised";
/// Marker for a family ended by logout.
pub const TERMINATED: &str = "!terminated";

const MAX_MARK_ATTEMPTS: usize = 8;

/// Decoded state of a refresh family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyState {
    /// Active; carries the current refresh token id.
    Active(String),
    /// Reuse was detected. No member token will ever validate again.
    Compromised,
    /// Ended on purpose (logout).
    Terminated,
    /// Expired or never existed.
    Missing,
}

impl FamilyState {
    /// Interpret a stored pointer value.
    pub fn from_stored(value: Option<String>) -> Self {
        match value.as_deref() {
            None => Self::Missing,
            Some(COMPROMISED) => Self::Compromised,
            Some(TERMINATED) => Self::Terminated,
            Some(_) => Self::Active(value.unwrap_or_default()),
        }
    }

    /// Read the state of a family.
    pub async fn load(store: &dyn RevocationStore, family_id: Uuid) -> AppResult<Self> {
        Ok(Self::from_stored(store.get(&keys::family(family_id)).await?))
    }
}

/// Open a new family whose current token is `jti`.
pub async fn open(
    store: &dyn RevocationStore,
    family_id: Uuid,
    jti: &str,
    ttl: Duration,
) -> AppResult<()> {
    store.set(&keys::family(family_id), jti, ttl).await
}

/// Flag a family compromised, keeping its remaining TTL.
///
/// Compromise overrides any pointer or the terminated marker.
pub async fn mark_compromised(store: &dyn RevocationStore, family_id: Uuid) -> AppResult<()> {
    mark(store, family_id, COMPROMISED).await
}

/// End a family on logout. A compromised family stays compromised.
pub async fn terminate(store: &dyn RevocationStore, family_id: Uuid) -> AppResult<()> {
    mark(store, family_id, TERMINATED).await
}

async fn mark(store: &dyn RevocationStore, family_id: Uuid, marker: &str) -> AppResult<()> {
    let key = keys::family(family_id);
    for _ in 0..MAX_MARK_ATTEMPTS {
        let current = match store.get(&key).await? {
            None => return Ok(()),
            Some(value) if value == COMPROMISED || value == marker => return Ok(()),
            Some(value) => value,
        };
        match store.compare_and_swap(&key, &current, marker, None).await? {
            CompareAndSwapOutcome::Updated | CompareAndSwapOutcome::Missing => {
                debug!(family_id = %family_id, marker, "Family pointer marked");
                return Ok(());
            }
            CompareAndSwapOutcome::Mismatch(_) => continue,
        }
    }
    Err(AppError::cache(format!(
        "Family {family_id} kept changing while being marked {marker}"
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cloudbox_cache::memory::MemoryRevocationStore;
    use cloudbox_core::clock::ManualClock;

    use super::*;

    #[tokio::test]
    async fn test_markers_keep_ttl_and_compromise_wins() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = MemoryRevocationStore::new(clock.clone());
        let family = Uuid::new_v4();

        open(&store, family, "jti-1", Duration::from_secs(100)).await.unwrap();
        clock.advance(Duration::from_secs(40));
        terminate(&store, family).await.unwrap();
        assert_eq!(FamilyState::load(&store, family).await.unwrap(), FamilyState::Terminated);
        assert_eq!(
            store.ttl(&keys::family(family)).await.unwrap(),
            Some(Duration::from_secs(60))
        );

        mark_compromised(&store, family).await.unwrap();
        terminate(&store, family).await.unwrap();
        assert_eq!(FamilyState::load(&store, family).await.unwrap(), FamilyState::Compromised);
    }

    #[tokio::test]
    async fn test_marking_missing_family_is_noop() {
        let store = MemoryRevocationStore::new(Arc::new(ManualClock::starting_now()));
        let family = Uuid::new_v4();
        mark_compromised(&store, family).await.unwrap();
        assert_eq!(FamilyState::load(&store, family).await.unwrap(), FamilyState::Missing);
    }
}
