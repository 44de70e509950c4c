//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-side and upstream
//! failures are captured to Sentry before the response is built, and their
//! details never reach the client. Shopify rejecting a customer or its tags
//! is a 422 carrying Shopify's message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::ServiceError;

/// Application-level error type for the API.
#[derive(Debug, Error)]
pub enum AppError {
    /// A contributor operation failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Missing or rejected bearer token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::AccountExists(_) => StatusCode::CONFLICT,
                ServiceError::NotAContributor { .. } => StatusCode::BAD_REQUEST,
                ServiceError::CustomerCreationFailed(_)
                | ServiceError::CustomerLookupFailed(_)
                | ServiceError::TagUpdateFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ServiceError::UpstreamUnavailable { .. }
                | ServiceError::MembershipInviteFailed(_) => StatusCode::BAD_GATEWAY,
                ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server and upstream errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else if status == StatusCode::UNPROCESSABLE_ENTITY {
            tracing::warn!(error = %self, "Upstream rejected the request");
        }

        // Don't expose internal error details to clients
        let message = match status {
            StatusCode::INTERNAL_SERVER_ERROR => "Internal server error".to_string(),
            StatusCode::BAD_GATEWAY => "External service error".to_string(),
            _ => self.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use swag_core::GithubUsername;

    use super::*;

    fn user() -> GithubUsername {
        GithubUsername::parse("gatsbot").unwrap()
    }

    #[test]
    fn test_service_error_status_codes() {
        let cases = [
            (
                AppError::from(ServiceError::AccountExists(user())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(ServiceError::NotAContributor {
                    username: user(),
                    org: "gatsbyjs".to_string(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ServiceError::UpstreamUnavailable {
                    service: "GitHub",
                    message: "timeout".to_string(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AppError::from(ServiceError::TagUpdateFailed("nope".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(ServiceError::CustomerLookupFailed("gone".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                AppError::from(ServiceError::Storage(RepositoryError::DataCorruption(
                    "bad row".to_string(),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status(), expected, "{error}");
        }
    }

    #[tokio::test]
    async fn test_conflict_message_reaches_client() {
        let response = AppError::from(ServiceError::AccountExists(user())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            json["error"],
            "An account already exists for the GitHub user @gatsbot"
        );
    }

    #[tokio::test]
    async fn test_customer_failure_message_reaches_client() {
        let response =
            AppError::from(ServiceError::CustomerCreationFailed("some other error".to_string()))
                .into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "some other error");
    }

    #[tokio::test]
    async fn test_upstream_details_are_hidden() {
        let response = AppError::from(ServiceError::UpstreamUnavailable {
            service: "Shopify",
            message: "token shpat_secret rejected".to_string(),
        })
        .into_response();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(!text.contains("shpat_secret"));
        assert!(text.contains("External service error"));
    }
}
