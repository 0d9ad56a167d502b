use async_trait::async_trait;
use std::time::Duration;

use crate::services::cache::client::{CacheClient, CacheError, CacheResult, WindowCount};

// KEYS[1] = counter, ARGV[1] = window in ms. Returns {count, pttl}.
// A key that somehow lost its TTL gets a fresh one instead of living forever.
const INCR_WINDOW_LUA: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
  redis.call('PEXPIRE', KEYS[1], ARGV[1])
  ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

const DECR_IF_PRESENT_LUA: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
if current > 0 then
  redis.call('DECR', KEYS[1])
end
return 0
"#;

// PEXPIRE needs at least 1 ms.
fn window_millis(window: Duration) -> CacheResult<u64> {
    u64::try_from(window.as_millis())
        .map(|ms| ms.max(1))
        .map_err(|_| CacheError::InvalidValue(format!("window too large: {window:?}")))
}

fn incr_window_cmd(key: &str, window_ms: u64) -> redis::Cmd {
    let mut cmd = redis::cmd("EVAL");
    cmd.arg(INCR_WINDOW_LUA).arg(1).arg(key).arg(window_ms);
    cmd
}

// `{count, pttl}` from INCR_WINDOW_LUA. A negative PTTL (-1 no expiry, -2 gone) reads as a
// full window.
fn decode_window(count: i64, ttl_ms: i64, window_ms: u64) -> CacheResult<WindowCount> {
    let count = u64::try_from(count)
        .map_err(|_| CacheError::InvalidValue(format!("negative counter: {count}")))?;
    let ttl = Duration::from_millis(u64::try_from(ttl_ms).unwrap_or(window_ms));

    Ok(WindowCount { count, ttl })
}

/// Valkey/Redis-backend cache client.
///
/// Only the counter operations used by the rate limiter are implemented, each as a
/// single EVAL so concurrent instances never interleave inside one update.
#[derive(Clone, Debug)]
pub struct ValkeyClient {
    manager: redis::aio::ConnectionManager,
}

impl ValkeyClient {
    // Create a Valkey client from a URL like `redis://localhost:6379`
    pub async fn new(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::BackendConnection(e.to_string()))?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl CacheClient for ValkeyClient {
    fn backend_name(&self) -> &'static str {
        "valkey"
    }

    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<WindowCount> {
        let mut conn = self.manager.clone();
        let window_ms = window_millis(window)?;

        let (count, ttl_ms): (i64, i64) = incr_window_cmd(key, window_ms)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        decode_window(count, ttl_ms, window_ms)
    }

    async fn decr_if_present(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.manager.clone();

        let _: i64 = redis::cmd("EVAL")
            .arg(DECR_IF_PRESENT_LUA)
            .arg(1)
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::BackendCommand(e.to_string()))?;

        Ok(())
    }
}
