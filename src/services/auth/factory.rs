/// Factory: build the `AuthGate` from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{AuthGate, PrincipalResolver, PrincipalStore, SessionVerifier};
use crate::services::clock::Clock;

pub fn build_auth_gate(
    config: &Config,
    store: Arc<dyn PrincipalStore>,
    clock: Arc<dyn Clock>,
) -> Arc<AuthGate> {
    tracing::info!(
        principal_store = store.backend_name(),
        lookup_timeout_ms = config.principal_lookup_timeout.as_millis() as u64,
        "auth gate ready"
    );

    let verifier = SessionVerifier::new(&config.session_jwt_secret);
    let resolver = PrincipalResolver::new(store, config.principal_lookup_timeout);

    Arc::new(AuthGate::new(verifier, resolver, clock))
}
