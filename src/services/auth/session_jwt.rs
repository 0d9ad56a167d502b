use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

/// Session token claims as they appear on the wire.
///
/// NOTE:
/// - `exp` is checked by us against the injected clock, not by jsonwebtoken, so that
///   "expired" can only ever be reported for a token whose signature already verified.
#[derive(Debug, Deserialize)]
struct SessionTokenClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
}

/// Claims of a session token whose signature and expiry were verified.
///
/// This is the cheap identity tier: no database confirmation has happened yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    pub subject_id: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid(VerifiedClaims),
    /// Signature is good but `now >= exp`.
    Expired,
    /// Bad signature, wrong algorithm, malformed structure or claims.
    Invalid,
}

/// HS256 session-token verifier.
///
/// - Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for SessionVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl SessionVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify signature + structure, then classify the expiry against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Verification {
        let claims = match jsonwebtoken::decode::<SessionTokenClaims>(
            token,
            &self.decoding_key,
            &self.validation,
        ) {
            Ok(data) => data.claims,
            Err(err) => {
                tracing::debug!(error = %err, "session token rejected");
                return Verification::Invalid;
            }
        };

        if claims.sub.trim().is_empty() {
            return Verification::Invalid;
        }

        let Some(expires_at) = DateTime::from_timestamp(claims.exp, 0) else {
            return Verification::Invalid;
        };
        let issued_at = match claims.iat {
            Some(iat) => match DateTime::from_timestamp(iat, 0) {
                Some(at) => Some(at),
                None => return Verification::Invalid,
            },
            None => None,
        };

        if now >= expires_at {
            return Verification::Expired;
        }

        Verification::Valid(VerifiedClaims {
            subject_id: claims.sub,
            issued_at,
            expires_at,
        })
    }
}
