//! Fixed-window rate limiting per endpoint class.

pub mod key;
pub mod limiter;
pub mod policy;
pub mod store;
pub mod valkey;

pub use limiter::{Decision, Quota, RateLimiter};
pub use policy::{LimitRequest, RateLimitPolicy};
pub use store::{CounterStore, CounterStoreError, MemoryCounterStore};
pub use valkey::ValkeyCounterStore;
