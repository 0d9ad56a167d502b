use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::services::auth::{
    ConfirmedPrincipal, GateVariant, Rejection, VerifiedClaims,
};

use super::{Claims, Confirmed};

/// middleware が VerifiedClaims を request.extensions() に insert 済みである前提
/// 見つからない場合は 401 (gate がかかってない route)
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<VerifiedClaims>()
            .cloned()
            .map(Claims)
            .ok_or_else(|| missing_tier("claims"))
    }
}

/// Admin gate 以外では ConfirmedPrincipal は入らない
impl<S> FromRequestParts<S> for Confirmed
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ConfirmedPrincipal>()
            .cloned()
            .map(Confirmed)
            .ok_or_else(|| missing_tier("confirmed principal"))
    }
}

fn missing_tier(tier: &'static str) -> AppError {
    tracing::error!(tier, "handler requested an identity its route gate does not provide");
    AppError::gate(Rejection::MissingCredential, GateVariant::General)
}
