/*
 * Responsibility
 * - /me, /admin/ 以下 の response DTO
 */
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::services::auth::{ConfirmedPrincipal, Role, VerifiedClaims};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub success: bool,
    pub user_id: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

impl From<VerifiedClaims> for SessionResponse {
    fn from(claims: VerifiedClaims) -> Self {
        Self {
            success: true,
            user_id: claims.subject_id,
            issued_at: claims.issued_at,
            expires_at: claims.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalResponse {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub is_banned: bool,
}

impl From<ConfirmedPrincipal> for PrincipalResponse {
    fn from(p: ConfirmedPrincipal) -> Self {
        Self {
            id: p.id,
            email: p.email,
            role: p.role,
            is_banned: p.banned,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub success: bool,
    pub user: PrincipalResponse,
}

impl UserEnvelope {
    pub fn ok(user: impl Into<PrincipalResponse>) -> Self {
        Self {
            success: true,
            user: user.into(),
        }
    }
}
