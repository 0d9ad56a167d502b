/*
 * Responsibility
 * - v1 の URL 構造を定義
 * - どの route にどの gate / rate limit を掛けるかもここで決める
 *
 * Layer order (外 → 内): rate limit → gate → handler
 */
use axum::{Router, routing::get};

use crate::middleware::{auth::access, rate_limit};
use crate::services::rate_limit::RateLimitPolicy;
use crate::state::AppState;

use crate::api::v1::handlers::{
    admin::{admin_me, get_user},
    health::health,
    me::me,
};

pub fn routes(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/health", get(health));

    let user = access::require_user(Router::new().route("/me", get(me)), state.clone());

    let admin = access::require_admin(Router::new().route("/admin/me", get(admin_me)), state.clone());

    // route_layer: 後から掛けた方が外側。limiter を先に通す
    let sensitive = Router::new().route("/admin/users/{user_id}", get(get_user));
    let sensitive = access::require_admin(sensitive, state.clone());
    let sensitive = rate_limit::limit(sensitive, state, &RateLimitPolicy::SENSITIVE_DATA);

    public.merge(user).merge(admin).merge(sensitive)
}
