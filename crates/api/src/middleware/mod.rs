//! HTTP middleware for the API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, one transaction per request)
//! 2. `TraceLayer` (method, uri, status and latency)
//! 3. CORS (the site calls the API from the browser)
//!
//! Token validation is an extractor, [`RequireToken`], added to the
//! handlers that need it.

pub mod auth;

pub use auth::{RequireToken, TokenValidator};
