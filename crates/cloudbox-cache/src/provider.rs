//! Store manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::info;

use cloudbox_core::clock::Clock;
use cloudbox_core::config::cache::CacheConfig;
use cloudbox_core::error::AppError;
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::store::{CompareAndSwapOutcome, RevocationStore, WindowCount};

/// Store manager that wraps the configured [`RevocationStore`] provider.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct StoreManager {
    inner: Arc<dyn RevocationStore>,
    #[cfg(feature = "memory")]
    memory: Option<crate::memory::MemoryRevocationStore>,
}

impl StoreManager {
    /// Create a new store manager from configuration.
    pub async fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> AppResult<Self> {
        match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis revocation store");
                let _ = clock;
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Ok(Self::from_store(Arc::new(
                    crate::redis::RedisRevocationStore::new(client),
                )))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory revocation store");
                Ok(Self::memory(clock))
            }
            other => Err(AppError::configuration(format!(
                "Unknown cache provider: '{other}'. Supported: memory, redis"
            ))),
        }
    }

    /// Create an in-memory store manager.
    #[cfg(feature = "memory")]
    pub fn memory(clock: Arc<dyn Clock>) -> Self {
        let store = crate::memory::MemoryRevocationStore::new(clock);
        Self {
            inner: Arc::new(store.clone()),
            memory: Some(store),
        }
    }

    /// Create a store manager from an existing provider.
    pub fn from_store(store: Arc<dyn RevocationStore>) -> Self {
        Self {
            inner: store,
            #[cfg(feature = "memory")]
            memory: None,
        }
    }

    /// Get a shared handle to the inner provider.
    pub fn store(&self) -> Arc<dyn RevocationStore> {
        Arc::clone(&self.inner)
    }

    /// Spawn the periodic purge of expired in-memory entries.
    ///
    /// Returns `None` for providers that expire keys themselves.
    #[cfg(feature = "memory")]
    pub fn spawn_sweeper(&self, every: Duration) -> Option<JoinHandle<()>> {
        let store = self.memory.clone()?;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.purge_expired();
            }
        }))
    }

    /// Spawn the periodic purge of expired in-memory entries.
    #[cfg(not(feature = "memory"))]
    pub fn spawn_sweeper(&self, _every: Duration) -> Option<JoinHandle<()>> {
        None
    }
}

#[async_trait]
impl RevocationStore for StoreManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        self.inner.incr_window(key, window).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        self.inner.ttl(key).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        replacement: &str,
        ttl: Option<Duration>,
    ) -> AppResult<CompareAndSwapOutcome> {
        self.inner
            .compare_and_swap(key, expected, replacement, ttl)
            .await
    }

    async fn take_if_equals(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.inner.take_if_equals(key, expected).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}

#[cfg(all(test, feature = "memory"))]
mod tests {
    use super::*;
    use cloudbox_core::clock::ManualClock;

    #[tokio::test]
    async fn test_memory_from_config() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let manager = StoreManager::new(&CacheConfig::default(), clock)
            .await
            .unwrap();
        assert_eq!(manager.provider_name(), "memory");
        manager.set("k", "v", Duration::from_secs(1)).await.unwrap();
        assert_eq!(manager.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_provider_rejected() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::starting_now());
        let config = CacheConfig {
            provider: "memcached".to_string(),
            ..CacheConfig::default()
        };
        let err = StoreManager::new(&config, clock).await.unwrap_err();
        assert_eq!(err.kind, cloudbox_core::error::ErrorKind::Configuration);
    }
}
