/*!
 * Authentication context extractors
 *
 * Responsibility:
 * - gate middleware が extensions に入れた identity を handler に渡す
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 *
 * Public API:
 * - Claims    (General gate: 署名済みトークンの claims)
 * - Confirmed (Admin gate: DB で確認済みの principal)
 */

mod core;
mod types;

pub use types::{Claims, Confirmed};
