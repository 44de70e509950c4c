//! Contributor route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use swag_core::{ContributionSummary, Contributor, GithubUsername};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::middleware::RequireToken;
use crate::models::{ContributorInput, DiscountCodeResponse};
use crate::state::AppState;

fn parse_username(raw: &str) -> Result<GithubUsername> {
    GithubUsername::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Unified view of a contributor.
#[instrument(skip(state, _token))]
pub async fn show(
    _token: RequireToken,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<Contributor>> {
    let username = parse_username(&username)?;
    let contributor = state.contributors().get_contributor(&username).await?;
    Ok(Json(contributor))
}

/// Merged pull requests of a user in the organization.
#[instrument(skip(state, _token))]
pub async fn contributions(
    _token: RequireToken,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Json<ContributionSummary>> {
    let username = parse_username(&username)?;
    let summary = state.contributors().contribution_summary(&username).await?;
    Ok(Json(summary))
}

/// Enrol a new contributor.
#[instrument(skip(state, _token, input), fields(username = %input.github_username))]
pub async fn create(
    _token: RequireToken,
    State(state): State<AppState>,
    Json(input): Json<ContributorInput>,
) -> Result<(StatusCode, Json<Contributor>)> {
    let contributor = state.contributors().create_contributor(&input).await?;
    Ok((StatusCode::CREATED, Json(contributor)))
}

/// Enrol a contributor and hand out their discount code.
///
/// Business failures are reported in the body with a 200; only an
/// unreachable GitHub turns into an error status.
#[instrument(skip(state, _token, input), fields(username = %input.github_username))]
pub async fn discount_code(
    _token: RequireToken,
    State(state): State<AppState>,
    Json(input): Json<ContributorInput>,
) -> Result<Json<DiscountCodeResponse>> {
    let response = state.contributors().request_discount_code(&input).await?;
    Ok(Json(response))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_username_is_bad_request() {
        let err = parse_username("-not-valid-").unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
