//! Skip → key → atomic hit → compare.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::services::clock::Clock;
use crate::services::rate_limit::policy::{LimitRequest, RateLimitPolicy};
use crate::services::rate_limit::store::{CounterStore, CounterStoreError};

/// Counter state reported back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    pub key: String,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The skip predicate matched; nothing was counted.
    Skipped,
    Allowed(Quota),
    Limited(Quota),
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("store", &self.store.backend_name())
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub async fn check(
        &self,
        policy: &RateLimitPolicy,
        req: &LimitRequest<'_>,
    ) -> Result<Decision, CounterStoreError> {
        if policy.should_skip(req) {
            tracing::debug!(policy = policy.name, "rate limit skipped");
            return Ok(Decision::Skipped);
        }

        let key = policy.key_for(req);
        let now = self.clock.now();
        let hit = self.store.hit(&key, policy.window, now).await?;

        let quota = Quota {
            limit: policy.max_attempts,
            remaining: policy.max_attempts.saturating_sub(hit.count),
            reset_after: (hit.resets_at - now).to_std().unwrap_or_default(),
            key,
        };

        if hit.count > policy.max_attempts {
            tracing::warn!(
                policy = policy.name,
                count = hit.count,
                limit = policy.max_attempts,
                "rate limit exceeded"
            );
            return Ok(Decision::Limited(quota));
        }

        Ok(Decision::Allowed(quota))
    }

    /// Returns an attempt counted by `check` (successful-request skipping).
    pub async fn give_back(&self, quota: &Quota) -> Result<(), CounterStoreError> {
        self.store.give_back(&quota.key).await
    }
}
