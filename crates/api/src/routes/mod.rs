//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /ping                               - "pong"
//! POST /feedback                           - Store site feedback
//! GET  /health                             - Liveness
//! GET  /health/ready                       - Database reachability
//!
//! # Requires a bearer token (outside development)
//! GET  /contributors/{username}               - Unified contributor view
//! GET  /contributors/{username}/contributions - Merged pull requests
//! POST /contributors                          - Enrol a contributor (409 if known)
//! POST /discount-code                         - Enrol and return the discount code
//! GET  /issues?label=...                      - Open issues with a label
//! ```

pub mod contributors;
pub mod issues;
pub mod public;

use std::time::Duration;

use axum::{
    Router,
    http::{Method, header},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::state::AppState;

/// Create the contributor routes router.
pub fn contributor_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(contributors::create))
        .route("/{username}", get(contributors::show))
        .route("/{username}/contributions", get(contributors::contributions))
}

/// Create all routes for the API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(public::ping))
        .route("/feedback", post(public::feedback))
        .route("/health", get(public::health))
        .route("/health/ready", get(public::readiness))
        .nest("/contributors", contributor_routes())
        .route("/discount-code", post(contributors::discount_code))
        .route("/issues", get(issues::index))
}

/// The complete application: routes, tracing and CORS, bound to `state`.
///
/// Sentry layers are added by the binary.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE]);

    routes()
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>, latency: Duration, span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
