//! Request security boundary: session authentication, role/ban-aware authorization
//! gates and per-endpoint-class rate limiting for an axum service.

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod repos;
pub mod services;
pub mod state;

#[cfg(test)]
pub(crate) mod test_support;
