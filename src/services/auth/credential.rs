//! Pulls the session token out of a request.
//!
//! Sources, in order:
//! 1. `token` cookie (non-empty after trimming). Always wins, whatever the header says.
//! 2. `Authorization: Bearer <header>.<payload>.<signature>`.
//!
//! A present `Authorization` header that is not a compact bearer token is reported as
//! malformed instead of being treated as "no credential".

use std::fmt;
use std::sync::LazyLock;

use axum::http::{HeaderMap, header};
use regex::Regex;

pub const SESSION_COOKIE_NAME: &str = "token";

// Three dot-separated URL-safe base64 segments; trailing `=` padding is tolerated.
static BEARER_COMPACT_JWT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Bearer ([A-Za-z0-9_-]+=*\.[A-Za-z0-9_-]+=*\.[A-Za-z0-9_-]+=*)$")
        .expect("bearer pattern compiles")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    Header,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    source: CredentialSource,
}

impl Credential {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Token material stays out of logs.
        f.debug_struct("Credential")
            .field("source", &self.source)
            .field("len", &self.raw.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
}

/// Returns the single candidate credential for this request, if any.
pub fn extract(headers: &HeaderMap) -> Result<Option<Credential>, CredentialError> {
    if let Some(raw) = session_cookie(headers) {
        return Ok(Some(Credential {
            raw,
            source: CredentialSource::Cookie,
        }));
    }

    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| CredentialError::MalformedHeader)?
        .trim();

    let token = BEARER_COMPACT_JWT
        .captures(value)
        .and_then(|caps| caps.get(1))
        .ok_or(CredentialError::MalformedHeader)?;

    Ok(Some(Credential {
        raw: token.as_str().to_string(),
        source: CredentialSource::Header,
    }))
}

/// Looks through every `Cookie` header (HTTP/2 may split them) for a non-empty `token`.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .filter(|(name, _)| name.trim() == SESSION_COOKIE_NAME)
        .map(|(_, value)| value.trim().trim_matches('"').trim())
        .find(|value| !value.is_empty())
        .map(str::to_string)
}
