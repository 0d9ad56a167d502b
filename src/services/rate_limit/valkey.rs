//! Shared counters in Valkey, for deployments with more than one instance.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};

use crate::services::cache::CacheClient;
use crate::services::rate_limit::store::{CounterStore, CounterStoreError, Hit};

/// The window is owned by the server-side TTL; `now` only anchors the reported reset time.
#[derive(Debug, Clone)]
pub struct ValkeyCounterStore<C: CacheClient> {
    cache: C,
}

impl<C: CacheClient> ValkeyCounterStore<C> {
    pub fn new(cache: C) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl<C: CacheClient> CounterStore for ValkeyCounterStore<C> {
    fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    async fn hit(
        &self,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Hit, CounterStoreError> {
        let counted = self.cache.incr_window(key, window).await?;
        let ttl = TimeDelta::from_std(counted.ttl.min(window))
            .map_err(|_| CounterStoreError::InvalidWindow(window))?;

        Ok(Hit {
            count: counted.count,
            resets_at: now + ttl,
        })
    }

    async fn give_back(&self, key: &str) -> Result<(), CounterStoreError> {
        self.cache.decr_if_present(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::{CacheError, WindowCount};
    #[cfg(feature = "valkey-tests")]
    use crate::services::cache::ValkeyClient;
    use crate::services::cache::client::CacheResult;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Scripted cache: hands out counts from a map and a fixed TTL.
    #[derive(Clone, Default)]
    struct FakeCache {
        counts: Arc<Mutex<HashMap<String, u64>>>,
        fail: bool,
    }

    #[async_trait]
    impl CacheClient for FakeCache {
        fn backend_name(&self) -> &'static str {
            "fake"
        }

        async fn incr_window(&self, key: &str, window: Duration) -> CacheResult<WindowCount> {
            if self.fail {
                return Err(CacheError::BackendConnection("refused".into()));
            }
            let mut counts = self.counts.lock().expect("lock");
            let count = counts.entry(key.to_string()).or_default();
            *count += 1;
            Ok(WindowCount {
                count: *count,
                ttl: window / 2,
            })
        }

        async fn decr_if_present(&self, key: &str) -> CacheResult<()> {
            if let Some(count) = self.counts.lock().expect("lock").get_mut(key) {
                *count = count.saturating_sub(1);
            }
            Ok(())
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
    }

    #[tokio::test]
    async fn reset_time_follows_server_ttl() {
        let store = ValkeyCounterStore::new(FakeCache::default());
        let hit = store
            .hit("k", Duration::from_secs(60), t0())
            .await
            .expect("hit");

        assert_eq!(hit.count, 1);
        assert_eq!(hit.resets_at, t0() + TimeDelta::seconds(30));
    }

    #[tokio::test]
    async fn backend_failure_is_an_error() {
        let store = ValkeyCounterStore::new(FakeCache {
            fail: true,
            ..FakeCache::default()
        });
        let err = store
            .hit("k", Duration::from_secs(60), t0())
            .await
            .expect_err("should fail");
        assert!(matches!(err, CounterStoreError::Cache(_)));
    }

    #[tokio::test]
    async fn give_back_decrements() {
        let store = ValkeyCounterStore::new(FakeCache::default());
        store.hit("k", Duration::from_secs(60), t0()).await.expect("hit");
        store.hit("k", Duration::from_secs(60), t0()).await.expect("hit");
        store.give_back("k").await.expect("give back");

        let hit = store.hit("k", Duration::from_secs(60), t0()).await.expect("hit");
        assert_eq!(hit.count, 2);
    }

    // Needs a server: VALKEY_URL=redis://127.0.0.1:6379 cargo test --features valkey-tests
    #[cfg(feature = "valkey-tests")]
    async fn live_store() -> ValkeyCounterStore<ValkeyClient> {
        let url = std::env::var("VALKEY_URL").expect("VALKEY_URL must be set for valkey-tests");
        ValkeyCounterStore::new(ValkeyClient::new(&url).await.expect("connect"))
    }

    #[cfg(feature = "valkey-tests")]
    #[tokio::test]
    async fn live_valkey_window() {
        let store = live_store().await;
        let key = format!("rl:test:{}", uuid::Uuid::new_v4());

        let first = store
            .hit(&key, Duration::from_secs(5), t0())
            .await
            .expect("hit");
        let second = store
            .hit(&key, Duration::from_secs(5), t0())
            .await
            .expect("hit");

        assert_eq!(first.count, 1);
        assert_eq!(second.count, 2);
        assert!(second.resets_at <= t0() + TimeDelta::seconds(5));

        store.give_back(&key).await.expect("give back");
        let third = store
            .hit(&key, Duration::from_secs(5), t0())
            .await
            .expect("hit");
        assert_eq!(third.count, 2);
    }

    #[cfg(feature = "valkey-tests")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn live_valkey_concurrent_hits_never_share_a_count() {
        let store = Arc::new(live_store().await);
        let key = format!("rl:test:{}", uuid::Uuid::new_v4());

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    store
                        .hit(&key, Duration::from_secs(5), t0())
                        .await
                        .expect("hit")
                        .count
                })
            })
            .collect();

        let mut counts = Vec::new();
        for task in tasks {
            counts.push(task.await.expect("join"));
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=32).collect::<Vec<u64>>());
    }
}
