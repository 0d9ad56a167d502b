//! Extractor → verifier → resolver → decision.
//!
//! Two variants share the first three steps:
//! - General: any existing account with a valid session passes; yields `VerifiedClaims`.
//!   Ban and role are deliberately not re-checked here.
//! - Admin: additionally rejects banned accounts, then non-admins; yields `ConfirmedPrincipal`.
//!
//! Exactly one outcome is produced per call and the checks run in a fixed order, so the
//! first failing step decides the rejection.

use std::fmt;
use std::sync::Arc;

use axum::http::{HeaderMap, StatusCode};

use crate::services::auth::credential::{self, CredentialError};
use crate::services::auth::principal::{ConfirmedPrincipal, PrincipalResolver, Resolution};
use crate::services::auth::session_jwt::{SessionVerifier, Verification, VerifiedClaims};
use crate::services::clock::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateVariant {
    General,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential")]
    MalformedCredential,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("expired credential")]
    Expired,
    #[error("user not found")]
    UserNotFound,
    #[error("account banned")]
    Banned,
    #[error("insufficient role")]
    InsufficientRole,
    #[error("internal error")]
    InternalError,
}

impl Rejection {
    /// Client-facing message. Fixed strings only; nothing derived from the request.
    pub fn message(self) -> &'static str {
        match self {
            Rejection::MissingCredential => "Authentication required. Please log in.",
            Rejection::MalformedCredential => {
                "Malformed authorization header. Expected Bearer token."
            }
            Rejection::InvalidCredential => "Invalid authentication token.",
            Rejection::Expired => "Session expired. Please log in again.",
            Rejection::UserNotFound => "Invalid token. User not found.",
            Rejection::Banned => "Access denied. Account has been banned.",
            Rejection::InsufficientRole => "Access denied. Admin privileges required.",
            Rejection::InternalError => "Internal server error.",
        }
    }

    pub fn status(self, variant: GateVariant) -> StatusCode {
        match self {
            Rejection::MissingCredential | Rejection::Expired | Rejection::UserNotFound => {
                StatusCode::UNAUTHORIZED
            }
            Rejection::MalformedCredential => StatusCode::BAD_REQUEST,
            Rejection::InvalidCredential => match variant {
                GateVariant::General => StatusCode::UNAUTHORIZED,
                GateVariant::Admin => StatusCode::FORBIDDEN,
            },
            Rejection::Banned | Rejection::InsufficientRole => StatusCode::FORBIDDEN,
            Rejection::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Clone)]
pub struct AuthGate {
    verifier: SessionVerifier,
    resolver: PrincipalResolver,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthGate")
            .field("verifier", &self.verifier)
            .field("resolver", &self.resolver)
            .finish_non_exhaustive()
    }
}

impl AuthGate {
    pub fn new(verifier: SessionVerifier, resolver: PrincipalResolver, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifier,
            resolver,
            clock,
        }
    }

    pub fn resolver(&self) -> &PrincipalResolver {
        &self.resolver
    }

    /// General gate: valid session for an existing account.
    pub async fn authorize_general(&self, headers: &HeaderMap) -> Result<VerifiedClaims, Rejection> {
        let (claims, _principal) = self.authenticate(headers, GateVariant::General).await?;
        Ok(claims)
    }

    /// Admin gate: valid session, not banned, admin role. Checked in that order.
    pub async fn authorize_admin(&self, headers: &HeaderMap) -> Result<ConfirmedPrincipal, Rejection> {
        let (_claims, principal) = self.authenticate(headers, GateVariant::Admin).await?;

        if principal.banned {
            tracing::warn!(user_id = %principal.id, "admin gate: banned account");
            return Err(Rejection::Banned);
        }
        if !principal.is_admin() {
            tracing::warn!(user_id = %principal.id, role = %principal.role, "admin gate: insufficient role");
            return Err(Rejection::InsufficientRole);
        }

        Ok(principal)
    }

    async fn authenticate(
        &self,
        headers: &HeaderMap,
        variant: GateVariant,
    ) -> Result<(VerifiedClaims, ConfirmedPrincipal), Rejection> {
        let credential = match credential::extract(headers) {
            Ok(Some(credential)) => credential,
            Ok(None) => return Err(Rejection::MissingCredential),
            Err(CredentialError::MalformedHeader) => {
                tracing::warn!(?variant, "malformed authorization header");
                return Err(Rejection::MalformedCredential);
            }
        };

        let claims = match self.verifier.verify(credential.raw(), self.clock.now()) {
            Verification::Valid(claims) => claims,
            Verification::Expired => {
                tracing::info!(?variant, source = ?credential.source(), "session token expired");
                return Err(Rejection::Expired);
            }
            Verification::Invalid => {
                tracing::warn!(?variant, source = ?credential.source(), "session token invalid");
                return Err(Rejection::InvalidCredential);
            }
        };

        match self.resolver.resolve(&claims.subject_id).await {
            Ok(Resolution::Found(principal)) => Ok((claims, principal)),
            Ok(Resolution::NotFound) => {
                tracing::warn!(?variant, subject = %claims.subject_id, "session subject has no account");
                Err(Rejection::UserNotFound)
            }
            Err(err) => {
                tracing::error!(?variant, error = %err, "principal lookup failed");
                Err(Rejection::InternalError)
            }
        }
    }
}
