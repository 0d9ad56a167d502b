/*
 * Responsibility
 * - Config読み込み → 依存生成 → Router 組み立て
 * - Middleware の適用 (HTTP/CORS/security headers)
 * - axum::serve() で起動、shutdown 時に sweeper を止める
 */
use std::net::SocketAddr;
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, RateLimitBackend};
use crate::middleware::{cors, http, security_headers};
use crate::services::auth::{PgPrincipalStore, build_auth_gate};
use crate::services::cache::{CacheClient, ValkeyClient};
use crate::services::clock::{Clock, SystemClock};
use crate::services::rate_limit::{
    CounterStore, MemoryCounterStore, RateLimiter, ValkeyCounterStore,
};
use crate::{api, state::AppState};

fn init_tracing() {
    // Prefer RUST_LOG if set; otherwise use a sensible default.
    // Ex:
    // RUST_LOG=info,gatekeeper=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // Always surface panics via tracing so they don't get "lost".
        tracing::error!(?info, "panic");

        // Development: crash the whole process so we notice immediately.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

/// Process-level services plus the background work tied to their lifetime.
pub struct Runtime {
    pub state: AppState,
    sweeper: Option<JoinHandle<()>>,
}

impl Runtime {
    pub fn shutdown(self) {
        if let Some(sweeper) = self.sweeper {
            sweeper.abort();
            tracing::info!("rate limit sweeper stopped");
        }
    }
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gatekeeper in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let runtime = build_runtime(&config).await?;
    let app = build_router(runtime.state.clone(), &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    // Connect info feeds the peer address to the rate limiter.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    runtime.shutdown();
    tracing::info!("server stopped");
    Ok(())
}

pub async fn build_runtime(config: &Config) -> Result<Runtime> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Lazy: the first request opens the connection, so startup does not wait on Postgres.
    let db = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.principal_lookup_timeout)
        .connect_lazy(&config.database_url)
        .context("invalid DATABASE_URL")?;
    let gate = build_auth_gate(config, Arc::new(PgPrincipalStore::new(db)), clock.clone());

    let (counters, sweeper) = match &config.rate_limit_backend {
        RateLimitBackend::Memory { sweep_every } => {
            let store = Arc::new(MemoryCounterStore::new());
            let sweeper = store.spawn_sweeper(*sweep_every, clock.clone());
            let store: Arc<dyn CounterStore> = store;
            (store, Some(sweeper))
        }
        RateLimitBackend::Valkey { url } => {
            let client = ValkeyClient::new(url)
                .await
                .context("failed to connect to Valkey")?;
            tracing::info!(backend = client.backend_name(), "shared rate limit counters");
            let store: Arc<dyn CounterStore> = Arc::new(ValkeyCounterStore::new(client));
            (store, None)
        }
    };

    let limiter = RateLimiter::new(counters, clock);
    tracing::info!(backend = limiter.backend_name(), "rate limiter ready");

    Ok(Runtime {
        state: AppState::new(gate, Arc::new(limiter), &config.trusted_proxies),
        sweeper,
    })
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(state.clone()))
        .with_state(state);

    // Outermost last: request id / trace wrap everything, including CORS preflights.
    let router = security_headers::apply(router);
    let router = cors::apply(router, config);
    http::apply(router, config)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
