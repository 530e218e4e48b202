//! Key-value store trait backing blacklist entries, family pointers,
//! rate-limit counters and one-time codes.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Counter state returned by [`RevocationStore::incr_window`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Value of the counter after the increment.
    pub count: u64,
    /// Time left until the counter's window closes.
    pub ttl: Duration,
}

/// Result of a compare-and-swap against a stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareAndSwapOutcome {
    /// The stored value matched and was replaced.
    Updated,
    /// The stored value differed; carries what was found.
    Mismatch(String),
    /// No live value was stored under the key.
    Missing,
}

/// Linearizable single-key store with millisecond TTLs.
///
/// Every key is expected to carry a TTL; the store never keeps an entry
/// past its expiry. Implementations apply their own key prefix.
#[async_trait]
pub trait RevocationStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a value by key. Returns `None` if absent or expired.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Set a value with a TTL, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()>;

    /// Set a value only if the key is absent. Returns `true` when written.
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool>;

    /// Delete a key. Returns `true` if a live entry was removed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Check whether a live entry exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Atomically increment a counter.
    ///
    /// The window TTL is applied only when the increment creates the key,
    /// so a window is never extended by later hits.
    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount>;

    /// Reset the TTL on an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool>;

    /// Remaining TTL of a key, or `None` if absent.
    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>>;

    /// Replace the value under `key` only if it currently equals `expected`.
    ///
    /// The key keeps its remaining TTL unless `ttl` is given.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        replacement: &str,
        ttl: Option<Duration>,
    ) -> AppResult<CompareAndSwapOutcome>;

    /// Delete the key only if it currently equals `expected`.
    /// Returns `true` when the entry matched and was consumed.
    async fn take_if_equals(&self, key: &str, expected: &str) -> AppResult<bool>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;

    /// Name of the backend, for logs and health output.
    fn provider_name(&self) -> &str;
}
