//! Counter storage for fixed-window rate limiting.
//!
//! `hit` is the only write path and must be atomic per key: reset-if-elapsed,
//! increment and read back happen as one step. Keys are independent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::services::cache::CacheError;
use crate::services::clock::Clock;

#[derive(Debug, Error)]
pub enum CounterStoreError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("window out of range: {0:?}")]
    InvalidWindow(Duration),
}

/// Counter state right after a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub count: u64,
    pub resets_at: DateTime<Utc>,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    // Returns the store name (for logging).
    fn backend_name(&self) -> &'static str;

    /// Count one attempt against `key`, opening a fresh window when none is running.
    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Hit, CounterStoreError>;

    /// Undo one attempt in the current window, if the window still exists.
    async fn give_back(&self, key: &str) -> Result<(), CounterStoreError>;
}

#[derive(Debug, Clone, Copy)]
struct Record {
    resets_at: DateTime<Utc>,
    count: u64,
}

/// Process-local counters. Suitable for a single instance.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    records: DashMap<String, Record>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every record whose window has ended.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| record.resets_at > now);
        before.saturating_sub(self.records.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Periodic eviction. The caller owns the handle and aborts it on shutdown.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        every: Duration,
        clock: Arc<dyn Clock>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = store.sweep(clock.now());
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = store.len(), "rate limit sweep");
                }
            }
        })
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Hit, CounterStoreError> {
        let span = TimeDelta::from_std(window).map_err(|_| CounterStoreError::InvalidWindow(window))?;

        // The entry guard holds the shard lock until the end of this block.
        let mut record = self.records.entry(key.to_owned()).or_insert(Record {
            resets_at: now + span,
            count: 0,
        });
        if now >= record.resets_at {
            *record = Record {
                resets_at: now + span,
                count: 0,
            };
        }
        record.count += 1;

        Ok(Hit {
            count: record.count,
            resets_at: record.resets_at,
        })
    }

    async fn give_back(&self, key: &str) -> Result<(), CounterStoreError> {
        if let Some(mut record) = self.records.get_mut(key) {
            record.count = record.count.saturating_sub(1);
        }
        Ok(())
    }
}
