/*
 * Responsibility
 * - repo 層の失敗 (接続/クエリ) を上位に伝える
 * - 「行がない」はエラーではなく Option::None で返す
 */
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("db error: {0}")]
    Db(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;
