//! Per-route rate limiting.
//!
//! Applied with `route_layer` in front of the auth gate, so a limited client is turned
//! away before any token or database work happens.
//!
//! Response headers on every counted request:
//! - `RateLimit-Limit`, `RateLimit-Remaining`, `RateLimit-Reset` (seconds)
//! - `Retry-After` on 429

use std::error::Error as StdError;
use std::net::SocketAddr;

use axum::{
    Router,
    body::{Body, to_bytes},
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde_json::Value;

use crate::error::AppError;
use crate::services::rate_limit::{
    Decision, LimitRequest, Quota, RateLimitPolicy, key,
};
use crate::state::AppState;

/// Upper bound for bodies buffered to evaluate a policy (email key, captcha skip).
pub const MAX_INSPECTED_BODY_BYTES: usize = 64 * 1024;

pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

type LimitState = (AppState, &'static RateLimitPolicy);

pub fn limit(
    router: Router<AppState>,
    state: AppState,
    policy: &'static RateLimitPolicy,
) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state((state, policy), rate_limit))
}

async fn rate_limit(
    State((state, policy)): State<LimitState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client_ip = key::client_ip(req.headers(), peer, &state.trusted_proxies);

    let (req, body) = if policy.reads_body() {
        buffer_json(req).await?
    } else {
        (req, None)
    };

    let decision = state
        .limiter
        .check(
            policy,
            &LimitRequest {
                client_ip,
                body: body.as_ref(),
            },
        )
        .await?;

    match decision {
        Decision::Skipped => Ok(next.run(req).await),
        Decision::Limited(quota) => {
            let mut res = AppError::rate_limited(policy).into_response();
            let headers = res.headers_mut();
            set_quota_headers(headers, &quota);
            headers.insert(header::RETRY_AFTER, HeaderValue::from(reset_seconds(&quota)));
            Ok(res)
        }
        Decision::Allowed(mut quota) => {
            let mut res = next.run(req).await;

            if policy.skip_successful_requests && res.status().as_u16() < 400 {
                match state.limiter.give_back(&quota).await {
                    Ok(()) => quota.remaining = (quota.remaining + 1).min(quota.limit),
                    Err(err) => {
                        tracing::warn!(policy = policy.name, error = %err, "failed to return attempt")
                    }
                }
            }

            set_quota_headers(res.headers_mut(), &quota);
            Ok(res)
        }
    }
}

/// Reads the body so the policy can look at it, then puts the same bytes back.
/// A body that is not JSON is passed through and treated as having no fields.
async fn buffer_json(req: Request<Body>) -> Result<(Request<Body>, Option<Value>), AppError> {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, MAX_INSPECTED_BODY_BYTES)
        .await
        .map_err(body_error)?;
    let json = serde_json::from_slice::<Value>(&bytes).ok();

    Ok((Request::from_parts(parts, Body::from(bytes)), json))
}

/// 413 only when a length limit tripped; any other read failure is the client's broken body.
fn body_error(err: axum::Error) -> AppError {
    let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return AppError::PayloadTooLarge;
        }
        source = cause.source();
    }

    tracing::warn!(error = %err, "failed to read request body");
    AppError::bad_request("Invalid request body.")
}

fn reset_seconds(quota: &Quota) -> u64 {
    let reset = quota.reset_after;
    reset.as_secs() + u64::from(reset.subsec_nanos() > 0)
}

fn set_quota_headers(headers: &mut HeaderMap, quota: &Quota) {
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(quota.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(quota.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_seconds(quota)));
}
