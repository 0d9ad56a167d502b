/*
 * Responsibility
 * - GET /me: General gate を通った session の内容を返す
 * - DB 確認済み情報は返さない (Claims tier のみ)
 */
use axum::Json;

use crate::api::v1::{dto::me::SessionResponse, extractors::Claims};

pub async fn me(Claims(claims): Claims) -> Json<SessionResponse> {
    Json(claims.into())
}
