pub mod auth_ctx;

pub use auth_ctx::{Claims, Confirmed};
