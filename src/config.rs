/*
 * Responsibility
 * - Load settings from the environment (.env is honoured in development)
 * - Validate them up front; a missing secret or store URL fails startup
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use ipnet::IpNet;
use thiserror::Error;

/// HS256 keys shorter than this are rejected at startup.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Where rate-limit counters live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitBackend {
    Memory { sweep_every: Duration },
    Valkey { url: String },
}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    pub database_url: String,
    pub cors_allowed_origins: Vec<String>,

    pub session_jwt_secret: Vec<u8>,
    pub principal_lookup_timeout: Duration,

    pub rate_limit_backend: RateLimitBackend,
    /// Peers allowed to report the client address via `X-Forwarded-For` / `X-Real-IP`.
    pub trusted_proxies: Vec<IpNet>,

    pub request_timeout: Duration,
    pub request_body_limit_bytes: usize,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the signing secret or credentials embedded in URLs.
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("principal_lookup_timeout", &self.principal_lookup_timeout)
            .field("trusted_proxies", &self.trusted_proxies)
            .field("request_timeout", &self.request_timeout)
            .field("request_body_limit_bytes", &self.request_body_limit_bytes)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't touch the process env.
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match get("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 3000,
        };
        let addr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = get("APP_ENV")
            .map(|raw| AppEnv::parse(&raw))
            .unwrap_or(AppEnv::Development);

        let database_url = get("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let cors_allowed_origins = get("CORS_ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        let session_jwt_secret = get("SESSION_JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("SESSION_JWT_SECRET"))?
            .into_bytes();
        if session_jwt_secret.len() < MIN_SESSION_SECRET_BYTES {
            return Err(ConfigError::Invalid("SESSION_JWT_SECRET"));
        }

        let principal_lookup_timeout = Duration::from_millis(parse_or(
            &get,
            "PRINCIPAL_LOOKUP_TIMEOUT_MS",
            2_000,
        )?);
        if principal_lookup_timeout.is_zero() {
            return Err(ConfigError::Invalid("PRINCIPAL_LOOKUP_TIMEOUT_MS"));
        }

        let rate_limit_backend = match get("RATE_LIMIT_BACKEND")
            .unwrap_or_else(|| "memory".to_string())
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => {
                let secs = parse_or(&get, "RATE_LIMIT_SWEEP_SECONDS", 60)?;
                if secs == 0 {
                    return Err(ConfigError::Invalid("RATE_LIMIT_SWEEP_SECONDS"));
                }
                RateLimitBackend::Memory {
                    sweep_every: Duration::from_secs(secs),
                }
            }
            "valkey" | "redis" => {
                let url = get("VALKEY_URL").ok_or(ConfigError::Missing("VALKEY_URL"))?;
                url::Url::parse(&url).map_err(|_| ConfigError::Invalid("VALKEY_URL"))?;
                RateLimitBackend::Valkey { url }
            }
            _ => return Err(ConfigError::Invalid("RATE_LIMIT_BACKEND")),
        };

        let trusted_proxies = match get("TRUSTED_PROXIES") {
            Some(raw) => parse_networks(&raw).ok_or(ConfigError::Invalid("TRUSTED_PROXIES"))?,
            None => Vec::new(),
        };

        let request_timeout = Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECONDS", 30)?);
        let request_body_limit_bytes =
            parse_or(&get, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)? as usize;

        Ok(Self {
            addr,
            app_env,
            database_url,
            cors_allowed_origins,
            session_jwt_secret,
            principal_lookup_timeout,
            rate_limit_backend,
            trusted_proxies,
            request_timeout,
            request_body_limit_bytes,
        })
    }
}

fn parse_or<F>(get: &F, key: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Comma-separated CIDRs; a bare address is a single-host network.
fn parse_networks(raw: &str) -> Option<Vec<IpNet>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .ok()
                .or_else(|| entry.parse::<std::net::IpAddr>().ok().map(IpNet::from))
        })
        .collect()
}
