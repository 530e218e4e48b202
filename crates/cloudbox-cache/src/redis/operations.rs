//! Redis store provider implementation.
//!
//! Plain commands cover the single-step operations. Anything that reads and
//! then writes runs as a Lua script so Redis executes it atomically.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, RedisResult};
use tracing::warn;

use cloudbox_core::error::{AppError, ErrorKind};
use cloudbox_core::result::AppResult;
use cloudbox_core::traits::store::{CompareAndSwapOutcome, RevocationStore, WindowCount};

use super::client::RedisClient;

/// Atomic increment that opens a window on first hit.
///
/// KEYS[1] = counter key
/// ARGV[1] = window in milliseconds
///
/// Returns `{count, pttl}`.
const INCR_WINDOW_SCRIPT: &str = r#"
    local count = redis.call('INCR', KEYS[1])
    local ttl = redis.call('PTTL', KEYS[1])
    if count == 1 or ttl < 0 then
        redis.call('PEXPIRE', KEYS[1], ARGV[1])
        ttl = tonumber(ARGV[1])
    end
    return {count, ttl}
"#;

/// Compare-and-swap on a string value.
///
/// KEYS[1] = key
/// ARGV[1] = expected value
/// ARGV[2] = replacement
/// ARGV[3] = new TTL in milliseconds, or 0 to keep the current TTL
///
/// Returns `{0, ''}` when missing, `{1, ''}` when updated, `{2, current}` on mismatch.
const COMPARE_AND_SWAP_SCRIPT: &str = r#"
    local current = redis.call('GET', KEYS[1])
    if not current then
        return {0, ''}
    end
    if current ~= ARGV[1] then
        return {2, current}
    end
    local ttl = tonumber(ARGV[3])
    if ttl > 0 then
        redis.call('SET', KEYS[1], ARGV[2], 'PX', ttl)
    else
        redis.call('SET', KEYS[1], ARGV[2], 'KEEPTTL')
    end
    return {1, ''}
"#;

/// Delete a key only when it holds the expected value.
///
/// KEYS[1] = key
/// ARGV[1] = expected value
const TAKE_IF_EQUALS_SCRIPT: &str = r#"
    if redis.call('GET', KEYS[1]) == ARGV[1] then
        return redis.call('DEL', KEYS[1])
    end
    return 0
"#;

/// Redis-backed [`RevocationStore`].
#[derive(Debug, Clone)]
pub struct RedisRevocationStore {
    client: RedisClient,
}

impl RedisRevocationStore {
    /// Create a new Redis store provider.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Cache, format!("Redis error: {e}"), e)
    }

    /// Run one round-trip under the configured timeout.
    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> AppResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        let limit = self.client.operation_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(Self::map_err),
            Err(_) => {
                warn!(operation, timeout_ms = limit.as_millis() as u64, "Redis operation timed out");
                Err(AppError::cache(format!(
                    "Redis {operation} timed out after {}ms",
                    limit.as_millis()
                )))
            }
        }
    }
}

/// Redis rejects a zero PX, so sub-millisecond TTLs round up.
fn px(ttl: Duration) -> u64 {
    (ttl.as_millis() as u64).max(1)
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        self.bounded("GET", conn.get(&full_key)).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let mut cmd = redis::cmd("SET");
        cmd.arg(&full_key).arg(value).arg("PX").arg(px(ttl));
        let _: () = self.bounded("SET", cmd.query_async(&mut conn)).await?;
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();

        // SET key value PX ttl NX
        let mut cmd = redis::cmd("SET");
        cmd.arg(&full_key)
            .arg(value)
            .arg("PX")
            .arg(px(ttl))
            .arg("NX");
        let result: Option<String> = self.bounded("SET NX", cmd.query_async(&mut conn)).await?;
        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let removed: i64 = self.bounded("DEL", conn.del(&full_key)).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        self.bounded("EXISTS", conn.exists(&full_key)).await
    }

    async fn incr_window(&self, key: &str, window: Duration) -> AppResult<WindowCount> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let script = redis::Script::new(INCR_WINDOW_SCRIPT);
        let mut invocation = script.key(&full_key);
        invocation.arg(px(window));

        let (count, ttl_ms): (i64, i64) = self
            .bounded("incr_window", invocation.invoke_async(&mut conn))
            .await?;
        Ok(WindowCount {
            count: count.max(0) as u64,
            ttl: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        self.bounded("PEXPIRE", conn.pexpire(&full_key, px(ttl) as i64))
            .await
    }

    async fn ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let ttl_ms: i64 = self.bounded("PTTL", conn.pttl(&full_key)).await?;
        // -2: missing. -1: no expiry, which this store never writes.
        Ok((ttl_ms >= 0).then(|| Duration::from_millis(ttl_ms as u64)))
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        replacement: &str,
        ttl: Option<Duration>,
    ) -> AppResult<CompareAndSwapOutcome> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let script = redis::Script::new(COMPARE_AND_SWAP_SCRIPT);
        let mut invocation = script.key(&full_key);
        invocation
            .arg(expected)
            .arg(replacement)
            .arg(ttl.map(px).unwrap_or(0));

        let (status, current): (i64, String) = self
            .bounded("compare_and_swap", invocation.invoke_async(&mut conn))
            .await?;
        match status {
            0 => Ok(CompareAndSwapOutcome::Missing),
            1 => Ok(CompareAndSwapOutcome::Updated),
            2 => Ok(CompareAndSwapOutcome::Mismatch(current)),
            other => Err(AppError::cache(format!(
                "Unexpected compare-and-swap result: {other}"
            ))),
        }
    }

    async fn take_if_equals(&self, key: &str, expected: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn_mut();
        let script = redis::Script::new(TAKE_IF_EQUALS_SCRIPT);
        let mut invocation = script.key(&full_key);
        invocation.arg(expected);

        let removed: i64 = self
            .bounded("take_if_equals", invocation.invoke_async(&mut conn))
            .await?;
        Ok(removed > 0)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(pong == "PONG")
    }

    fn provider_name(&self) -> &str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_never_zero() {
        assert_eq!(px(Duration::ZERO), 1);
        assert_eq!(px(Duration::from_micros(300)), 1);
        assert_eq!(px(Duration::from_secs(2)), 2_000);
    }
}
