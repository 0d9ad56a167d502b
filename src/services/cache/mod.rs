pub mod client;
pub mod valkey;

pub use client::{CacheClient, CacheError, WindowCount};
pub use valkey::ValkeyClient;
