/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - gate の Rejection / rate limit / store エラーを統一的に変換
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::repos::error::RepoError;
use crate::services::auth::{GateVariant, Rejection};
use crate::services::rate_limit::{CounterStoreError, RateLimitPolicy};

/// `{ "success": false, "error": "...", "requiresRecaptcha": true }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub requires_recaptcha: bool,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{rejection}")]
    Gate {
        rejection: Rejection,
        variant: GateVariant,
    },
    #[error("rate limited: {message}")]
    RateLimited {
        message: &'static str,
        requires_recaptcha: bool,
    },
    #[error("bad request: {message}")]
    BadRequest { message: &'static str },
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("not found: {resource}")]
    NotFound { resource: &'static str },
    #[error("internal server error")]
    Internal,
}

impl AppError {
    pub fn gate(rejection: Rejection, variant: GateVariant) -> Self {
        Self::Gate { rejection, variant }
    }

    pub fn rate_limited(policy: &RateLimitPolicy) -> Self {
        Self::RateLimited {
            message: policy.message,
            requires_recaptcha: policy.requires_recaptcha,
        }
    }

    pub fn bad_request(message: &'static str) -> Self {
        Self::BadRequest { message }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Gate { rejection, variant } => rejection.status(*variant),
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, requires_recaptcha) = match self {
            AppError::Gate { rejection, .. } => (rejection.message().to_string(), false),
            AppError::RateLimited {
                message,
                requires_recaptcha,
            } => (message.to_string(), requires_recaptcha),
            AppError::BadRequest { message } => (message.to_string(), false),
            AppError::PayloadTooLarge => ("Request body too large.".to_string(), false),
            AppError::NotFound { resource } => (format!("{resource} not found."), false),
            AppError::Internal => (Rejection::InternalError.message().to_string(), false),
        };

        let body = ErrorResponse {
            success: false,
            error,
            requires_recaptcha,
        };

        (status, Json(body)).into_response()
    }
}

impl From<RepoError> for AppError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::Db(err) => {
                tracing::error!(error = %err, "database error");
                AppError::Internal
            }
        }
    }
}

impl From<CounterStoreError> for AppError {
    fn from(e: CounterStoreError) -> Self {
        // Fail closed: a limiter we cannot consult does not let the request through.
        tracing::error!(error = %e, "rate limit store failure");
        AppError::Internal
    }
}
