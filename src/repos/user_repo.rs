/*
 * Responsibility
 * - users テーブルから認可に必要な列だけを読む (read-only)
 * - PII の復号やプロフィール更新はこのサービスの外側
 * - DB エラーは RepoError で返し、NotFound とは区別する
 */
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoResult;

#[derive(Debug, FromRow)]
pub struct PrincipalRow {
    #[sqlx(rename = "userId")]
    pub id: Uuid,
    pub email: String,
    pub role: String,
    #[sqlx(rename = "isBanned")]
    pub banned: bool,
}

/// Always hits the database; callers rely on this to see bans and role changes immediately.
pub async fn find_principal(db: &PgPool, user_id: Uuid) -> RepoResult<Option<PrincipalRow>> {
    let row = sqlx::query_as::<_, PrincipalRow>(
        r#"
        SELECT "userId", "email", "role", "isBanned"
        FROM users
        WHERE "userId" = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}
