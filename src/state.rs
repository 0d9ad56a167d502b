/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - gate: 認証/認可, limiter: rate limit カウンタ
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use std::sync::Arc;

use ipnet::IpNet;

use crate::services::auth::AuthGate;
use crate::services::rate_limit::RateLimiter;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub limiter: Arc<RateLimiter>,
    /// Peers whose forwarding headers are believed.
    pub trusted_proxies: Arc<[IpNet]>,
}

impl AppState {
    pub fn new(gate: Arc<AuthGate>, limiter: Arc<RateLimiter>, trusted_proxies: &[IpNet]) -> Self {
        Self {
            gate,
            limiter,
            trusted_proxies: trusted_proxies.into(),
        }
    }
}
