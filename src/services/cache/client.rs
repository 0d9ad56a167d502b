//! Cache client interface used by higher-level services (shared rate-limit counters).
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/reply shape).
///
/// Kept independent from `AppError`; the rate limiter decides how a backend
/// failure surfaces (it fails closed).
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// Counter state after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    /// Time left before the key (and with it the window) disappears.
    pub ttl: Duration,
}

/// A minimal cache interface.
///
/// Small on purpose: fixed-window limiting only needs an atomic
/// "increment, set TTL on first hit, read TTL" and a matching decrement.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging/metrics).
    fn backend_name(&self) -> &'static str;

    // Increment `key` in one round trip. The first increment starts a `window` TTL;
    // later increments leave the TTL alone.
    async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<WindowCount>;

    // Decrement `key` if it still exists and is positive. TTL is preserved.
    async fn decr_if_present(&self, key: &str) -> CacheResult<()>;
}
