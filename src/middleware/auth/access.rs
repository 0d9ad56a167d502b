//! Session 検証 → identity を extensions に入れる
//!
//! - `require_user`: General gate。`VerifiedClaims` を格納する (ban/role は見ない)
//! - `require_admin`: Admin gate。`ConfirmedPrincipal` を格納する
//!
//! どちらも `route_layer` で掛けるので、存在しないパスには 404 が先に返る。

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::GateVariant;
use crate::state::AppState;

/// 例：
/// ```ignore
/// let me = Router::new().route("/me", get(me));
/// let me = middleware::auth::access::require_user(me, state.clone());
/// ```
pub fn require_user(router: Router<AppState>, state: AppState) -> Router<AppState> {
    // axum 0.8 の from_fn は State extractor を受け取れないため、`from_fn_with_state` で明示的に state を渡す
    router.route_layer(middleware::from_fn_with_state(state, general_gate))
}

pub fn require_admin(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.route_layer(middleware::from_fn_with_state(state, admin_gate))
}

async fn general_gate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = state
        .gate
        .authorize_general(req.headers())
        .await
        .map_err(|rejection| AppError::gate(rejection, GateVariant::General))?;

    // middleware → extractor への受け渡し
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

async fn admin_gate(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let principal = state
        .gate
        .authorize_admin(req.headers())
        .await
        .map_err(|rejection| AppError::gate(rejection, GateVariant::Admin))?;

    tracing::debug!(user_id = %principal.id, "admin authorized");
    req.extensions_mut().insert(principal);

    Ok(next.run(req).await)
}
