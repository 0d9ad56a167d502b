//! Fakes and fixtures shared by the unit and router tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, TimeDelta, Utc};
use ipnet::IpNet;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::services::auth::principal::PrincipalStoreError;
use crate::services::auth::{
    AuthGate, ConfirmedPrincipal, PrincipalResolver, PrincipalStore, Role, SessionVerifier,
};
use crate::services::clock::ManualClock;
use crate::services::rate_limit::{MemoryCounterStore, RateLimiter};
use crate::state::AppState;

pub const SECRET: &[u8] = b"test-session-secret-with-32-bytes!!";
pub const LOOKUP_TIMEOUT: Duration = Duration::from_millis(200);

/// Fixed "now" for every clock in the tests.
pub fn now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
}

pub fn mint_token(sub: &str, iat: DateTime<Utc>, exp: DateTime<Utc>) -> String {
    mint_token_with(json!({
        "sub": sub,
        "iat": iat.timestamp(),
        "exp": exp.timestamp(),
    }))
}

pub fn mint_token_with(claims: Value) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .expect("sign test token")
}

/// Token valid for an hour around `now()`.
pub fn session_token(sub: &str) -> String {
    mint_token(sub, now() - TimeDelta::minutes(5), now() + TimeDelta::hours(1))
}

/// Correctly signed token whose expiry already passed.
pub fn token_expired(sub: &str) -> String {
    mint_token(sub, now() - TimeDelta::hours(2), now() - TimeDelta::hours(1))
}

pub fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).expect("header"),
    );
    headers
}

pub fn cookie(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::COOKIE,
        HeaderValue::from_str(&format!("token={token}")).expect("header"),
    );
    headers
}

/// In-memory principal store that counts lookups.
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    users: Mutex<HashMap<Uuid, ConfirmedPrincipal>>,
    lookups: AtomicUsize,
}

impl MemoryPrincipalStore {
    pub fn insert(&self, email: &str, role: Role, banned: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.users.lock().expect("users").insert(
            id,
            ConfirmedPrincipal {
                id,
                email: email.to_string(),
                role,
                banned,
            },
        );
        id
    }

    pub fn set_banned(&self, id: Uuid, banned: bool) {
        if let Some(user) = self.users.lock().expect("users").get_mut(&id) {
            user.banned = banned;
        }
    }

    pub fn set_role(&self, id: Uuid, role: Role) {
        if let Some(user) = self.users.lock().expect("users").get_mut(&id) {
            user.role = role;
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, id: Uuid) -> Result<Option<ConfirmedPrincipal>, PrincipalStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.users.lock().expect("users").get(&id).cloned())
    }
}

#[derive(Debug)]
pub struct FailingPrincipalStore;

#[async_trait]
impl PrincipalStore for FailingPrincipalStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn find(&self, _id: Uuid) -> Result<Option<ConfirmedPrincipal>, PrincipalStoreError> {
        Err(PrincipalStoreError::Unavailable("connection refused".into()))
    }
}

/// Answers "not found" after sleeping for the given duration.
#[derive(Debug)]
pub struct SlowPrincipalStore(pub Duration);

#[async_trait]
impl PrincipalStore for SlowPrincipalStore {
    fn backend_name(&self) -> &'static str {
        "slow"
    }

    async fn find(&self, _id: Uuid) -> Result<Option<ConfirmedPrincipal>, PrincipalStoreError> {
        tokio::time::sleep(self.0).await;
        Ok(None)
    }
}

pub fn auth_gate(store: Arc<dyn PrincipalStore>) -> AuthGate {
    AuthGate::new(
        SessionVerifier::new(SECRET),
        PrincipalResolver::new(store, LOOKUP_TIMEOUT),
        Arc::new(ManualClock::at(now())),
    )
}

/// Everything a router test needs to poke at.
pub struct TestApp {
    pub state: AppState,
    pub principals: Arc<MemoryPrincipalStore>,
    pub counters: Arc<MemoryCounterStore>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::behind_proxies(&[])
    }

    pub fn behind_proxies(trusted_proxies: &[IpNet]) -> Self {
        let principals = Arc::new(MemoryPrincipalStore::default());
        let counters = Arc::new(MemoryCounterStore::new());
        let clock = Arc::new(ManualClock::at(now()));

        let gate = AuthGate::new(
            SessionVerifier::new(SECRET),
            PrincipalResolver::new(principals.clone(), LOOKUP_TIMEOUT),
            clock.clone(),
        );
        let limiter = RateLimiter::new(counters.clone(), clock.clone());

        Self {
            state: AppState::new(Arc::new(gate), Arc::new(limiter), trusted_proxies),
            principals,
            counters,
            clock,
        }
    }
}
