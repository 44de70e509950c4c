//! Open issue search.

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use swag_core::OpenIssues;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireToken;
use crate::state::AppState;

/// Query string for `GET /issues`.
#[derive(Debug, Deserialize)]
pub struct IssuesQuery {
    pub label: String,
}

/// Open issues in the organization carrying a label.
#[instrument(skip(state, _token))]
pub async fn index(
    _token: RequireToken,
    State(state): State<AppState>,
    Query(query): Query<IssuesQuery>,
) -> Result<Json<OpenIssues>> {
    let label = query.label.trim();
    if label.is_empty() {
        return Err(AppError::BadRequest("label cannot be empty".to_string()));
    }

    let issues = state.contributors().open_issues(label).await?;
    Ok(Json(issues))
}
