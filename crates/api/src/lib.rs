//! Contributor swag API library.
//!
//! Verifies GitHub contributors, enrols them in the contributor team and
//! provisions Shopify customers tagged for contributor discount codes.
//! Exposed as a library so the binary, the CLI and the integration tests
//! share one implementation.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod github;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod shopify;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("swag-api/", env!("CARGO_PKG_VERSION"));
