/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth (gate), rate_limit は route 単位、http/cors/security_headers は Router 全体
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod rate_limit;
pub mod security_headers;
