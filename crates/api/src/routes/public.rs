//! Routes that need no bearer token.

use axum::{Json, extract::State, http::StatusCode};
use tracing::instrument;

use crate::error::Result;
use crate::models::FeedbackInput;
use crate::state::AppState;

/// Connectivity check.
pub async fn ping() -> &'static str {
    "pong"
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Store a feedback entry from the site.
#[instrument(skip(state, input), fields(rating = input.rating))]
pub async fn feedback(
    State(state): State<AppState>,
    Json(input): Json<FeedbackInput>,
) -> Result<Json<&'static str>> {
    let record = state.feedback().create(&input).await?;
    tracing::info!(feedback_id = %record.id, "Feedback stored");
    Ok(Json("success"))
}
