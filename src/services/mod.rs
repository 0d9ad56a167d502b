pub mod auth;
pub mod cache;
pub mod clock;
pub mod rate_limit;
