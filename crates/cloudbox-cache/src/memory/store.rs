//! In-memory store built on dashmap.
//!
//! Each key lives in one shard of the map, and every read-modify-write goes
//! through that shard's entry lock, so single-key operations are atomic with
//! respect to each other. Expiry is measured against the injected clock and
//! enforced lazily on access; [`MemoryRevocationStore::purge_expired`] drops
//! whatever was never touched again.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use cloudbox_core::clock::Clock;
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::store::{CompareAndSwapOutcome, RevocationStore, WindowCount};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at_ms: i64,
}

impl StoredValue {
    fn new(value: impl Into<String>, now_ms: i64, ttl: Duration) -> Self {
        Self {
            value: value.into(),
            expires_at_ms: now_ms.saturating_add(ttl_millis(ttl)),
        }
    }

    fn is_live(&self, now_ms: i64) -> bool {
        self.expires_at_ms > now_ms
    }

    fn remaining(&self, now_ms: i64) -> Duration {
        Duration::from_millis(self.expires_at_ms.saturating_sub(now_ms).max(0) as u64)
    }
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// Single-process [`RevocationStore`].
#[derive(Debug, Clone)]
pub struct MemoryRevocationStore {
    entries: Arc<DashMap<String, StoredValue>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationStore {
    /// Create an empty store reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            debug!(purged, "Purged expired store entries");
        }
        purged
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn now(&self) -> i64 {
        self.clock.now_millis()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = self.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_live(now) => {
                Ok(Some(occupied.get().value.clone()))
            }
            Entry::Occupied(occupied) => {
                occupied.remove();
                Ok(None)
            }
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let now = self.now();
        self.entries
            .insert(key.to_string(), StoredValue::new(value, now, ttl));
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let now = self.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_live(now) => Ok(false),
            Entry::Occupied(mut occupied) => {
                occupied.insert(StoredValue::new(value, now, ttl));
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, now, ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let now = self.now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        let now = self.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let entry = occupied.get_mut();
                let count = entry.value.parse::<u64>().map_err(|_| {
                    AppError::cache(format!("Value under '{key}' is not a counter"))
                })? + 1;
                entry.value = count.to_string();
                Ok(WindowCount {
                    count,
                    ttl: entry.remaining(now),
                })
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(StoredValue::new("1", now, window));
                Ok(WindowCount {
                    count: 1,
                    ttl: window,
                })
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new("1", now, window));
                Ok(WindowCount {
                    count: 1,
                    ttl: window,
                })
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let now = self.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                occupied.get_mut().expires_at_ms = now.saturating_add(ttl_millis(ttl));
                Ok(true)
            }
            Entry::Occupied(occupied) => {
                occupied.remove();
                Ok(false)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let now = self.now();
        Ok(self
            .entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.remaining(now)))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        replacement: &str,
        ttl: Option<Duration>,
    ) -> AppResult<CompareAndSwapOutcome> {
        let now = self.now();
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let entry = occupied.get_mut();
                if entry.value != expected {
                    return Ok(CompareAndSwapOutcome::Mismatch(entry.value.clone()));
                }
                entry.value = replacement.to_string();
                if let Some(ttl) = ttl {
                    entry.expires_at_ms = now.saturating_add(ttl_millis(ttl));
                }
                Ok(CompareAndSwapOutcome::Updated)
            }
            Entry::Occupied(occupied) => {
                occupied.remove();
                Ok(CompareAndSwapOutcome::Missing)
            }
            Entry::Vacant(_) => Ok(CompareAndSwapOutcome::Missing),
        }
    }

    async fn take_if_equals(&self, key: &str, expected: &str) -> AppResult<bool> {
        let now = self.now();
        Ok(self
            .entries
            .remove_if(key, |_, entry| entry.is_live(now) && entry.value == expected)
            .is_some())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use cloudbox_core::clock::ManualClock;

    fn make_store() -> (MemoryRevocationStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        ));
        (MemoryRevocationStore::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_set_get_expires_with_clock() {
        let (store, clock) = make_store();
        store
            .set("k", "v", Duration::from_secs(10))
            .await
            .unwrap();
        clock.advance(Duration::from_millis(9_999));
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        clock.advance(Duration::from_millis(1));
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_set_nx_respects_live_entries_only() {
        let (store, clock) = make_store();
        assert!(store.set_nx("nx", "a", Duration::from_secs(5)).await.unwrap());
        assert!(!store.set_nx("nx", "b", Duration::from_secs(5)).await.unwrap());
        clock.advance(Duration::from_secs(5));
        assert!(store.set_nx("nx", "c", Duration::from_secs(5)).await.unwrap());
        assert_eq!(store.get("nx").await.unwrap(), Some("c".to_string()));
    }

    #[tokio::test]
    async fn test_incr_window_ttl_set_once() {
        let (store, clock) = make_store();
        let window = Duration::from_secs(60);
        let first = store.incr_window("rate", window).await.unwrap();
        assert_eq!(first, WindowCount { count: 1, ttl: window });

        clock.advance(Duration::from_secs(20));
        let second = store.incr_window("rate", window).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl, Duration::from_secs(40));

        clock.advance(Duration::from_secs(40));
        let fresh = store.incr_window("rate", window).await.unwrap();
        assert_eq!(fresh, WindowCount { count: 1, ttl: window });
    }

    #[tokio::test]
    async fn test_compare_and_swap_outcomes() {
        let (store, clock) = make_store();
        assert_eq!(
            store.compare_and_swap("f", "a", "b", None).await.unwrap(),
            CompareAndSwapOutcome::Missing
        );

        store.set("f", "a", Duration::from_secs(30)).await.unwrap();
        clock.advance(Duration::from_secs(10));
        assert_eq!(
            store.compare_and_swap("f", "a", "b", None).await.unwrap(),
            CompareAndSwapOutcome::Updated
        );
        assert_eq!(
            store.ttl("f").await.unwrap(),
            Some(Duration::from_secs(20))
        );
        assert_eq!(
            store.compare_and_swap("f", "a", "c", None).await.unwrap(),
            CompareAndSwapOutcome::Mismatch("b".to_string())
        );
        assert_eq!(
            store
                .compare_and_swap("f", "b", "d", Some(Duration::from_secs(90)))
                .await
                .unwrap(),
            CompareAndSwapOutcome::Updated
        );
        assert_eq!(
            store.ttl("f").await.unwrap(),
            Some(Duration::from_secs(90))
        );
    }

    #[tokio::test]
    async fn test_take_if_equals_only_consumes_on_match() {
        let (store, _clock) = make_store();
        store.set("code", "123456", Duration::from_secs(60)).await.unwrap();
        assert!(!store.take_if_equals("code", "000000").await.unwrap());
        assert!(store.exists("code").await.unwrap());
        assert!(store.take_if_equals("code", "123456").await.unwrap());
        assert!(!store.exists("code").await.unwrap());
        assert!(!store.take_if_equals("code", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn test_expire_and_purge() {
        let (store, clock) = make_store();
        store.set("a", "1", Duration::from_secs(5)).await.unwrap();
        store.set("b", "1", Duration::from_secs(50)).await.unwrap();
        assert!(store.expire("a", Duration::from_secs(100)).await.unwrap());
        assert!(!store.expire("missing", Duration::from_secs(1)).await.unwrap());

        clock.advance(Duration::from_secs(60));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.exists("a").await.unwrap());
        assert!(!store.exists("b").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cas_has_single_winner() {
        let (store, _clock) = make_store();
        store.set("ptr", "t0", Duration::from_secs(60)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap("ptr", "t0", &format!("t{}", i + 1), None)
                    .await
                    .unwrap()
            }));
        }

        let mut updated = 0;
        for handle in handles {
            if handle.await.unwrap() == CompareAndSwapOutcome::Updated {
                updated += 1;
            }
        }
        assert_eq!(updated, 1);
    }
}
