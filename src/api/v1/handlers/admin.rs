/*
 * Responsibility
 * - /admin/ 以下 handler (Admin gate 済み)
 * - GET /admin/me: 自分の principal
 * - GET /admin/users/{user_id}: 任意ユーザーの principal (sensitive-data rate limit 対象)
 */
use axum::{
    Json,
    extract::{Path, State, rejection::PathRejection},
};
use uuid::Uuid;

use crate::{
    api::v1::{dto::me::UserEnvelope, extractors::Confirmed},
    error::AppError,
    services::auth::principal::Resolution,
    state::AppState,
};

pub async fn admin_me(Confirmed(principal): Confirmed) -> Json<UserEnvelope> {
    Json(UserEnvelope::ok(principal))
}

pub async fn get_user(
    State(state): State<AppState>,
    Confirmed(admin): Confirmed,
    user_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let Path(user_id) = user_id.map_err(|rejection| {
        tracing::debug!(error = %rejection, "bad user id in path");
        AppError::bad_request("Invalid user id.")
    })?;

    let resolution = state
        .gate
        .resolver()
        .resolve(&user_id.to_string())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "user lookup failed");
            AppError::Internal
        })?;

    match resolution {
        Resolution::Found(user) => {
            tracing::info!(admin_id = %admin.id, user_id = %user.id, "admin viewed user");
            Ok(Json(UserEnvelope::ok(user)))
        }
        Resolution::NotFound => Err(AppError::not_found("User")),
    }
}
