//! Bearer token validation.
//!
//! Tokens are checked against an external userinfo endpoint: a 200 reply
//! means the token is valid, 401 or 403 means it is not. Verdicts are cached
//! for a minute, keyed by the SHA-256 of the token so raw tokens never sit in
//! memory longer than the request.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
};
use moka::future::Cache;
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::state::AppState;

/// How long a verdict is reused.
const VERDICT_TTL: Duration = Duration::from_secs(60);

const VERDICT_CAPACITY: u64 = 10_000;

/// Checks bearer tokens against the userinfo endpoint.
#[derive(Clone)]
pub struct TokenValidator {
    inner: Arc<TokenValidatorInner>,
}

struct TokenValidatorInner {
    client: reqwest::Client,
    /// `None` accepts every request.
    userinfo_url: Option<String>,
    verdicts: Cache<String, bool>,
}

impl TokenValidator {
    /// Create a validator. With no `userinfo_url`, validation is off.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(userinfo_url: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(TokenValidatorInner {
                client,
                userinfo_url,
                verdicts: Cache::builder()
                    .max_capacity(VERDICT_CAPACITY)
                    .time_to_live(VERDICT_TTL)
                    .build(),
            }),
        })
    }

    /// Whether tokens are checked at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.userinfo_url.is_some()
    }

    /// Whether `token` is accepted by the userinfo endpoint.
    ///
    /// Only definite answers are cached: success, 401 and 403. Transport
    /// failures and any other status reject the request without caching.
    pub async fn validate(&self, token: &str) -> bool {
        let Some(url) = &self.inner.userinfo_url else {
            return true;
        };

        let key = hex::encode(Sha256::digest(token.as_bytes()));
        if let Some(verdict) = self.inner.verdicts.get(&key).await {
            return verdict;
        }

        let status = match self.inner.client.get(url).bearer_auth(token).send().await {
            Ok(response) => response.status(),
            Err(e) => {
                tracing::warn!(error = %e, "Token validation request failed");
                return false;
            }
        };

        let verdict = match status {
            s if s.is_success() => true,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                tracing::debug!("Bearer token rejected");
                false
            }
            other => {
                tracing::warn!(status = %other, "Token validation service error");
                return false;
            }
        };

        self.inner.verdicts.insert(key, verdict).await;
        verdict
    }
}

/// Extractor that requires a valid bearer token.
///
/// Passes every request through when validation is disabled.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(_token: RequireToken) -> impl IntoResponse {
///     "only with a valid token"
/// }
/// ```
pub struct RequireToken;

impl FromRequestParts<AppState> for RequireToken {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let validator = state.token_validator();
        if !validator.is_enabled() {
            return Ok(Self);
        }

        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

        if validator.validate(token).await {
            Ok(Self)
        } else {
            Err(AppError::Unauthorized("Invalid bearer token".to_string()))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::{Router, routing::get};

    use super::*;

    /// Serve a userinfo endpoint that answers with `statuses` in turn, then
    /// repeats the last one. Returns the URL and the request counter.
    async fn userinfo_stub(statuses: Vec<StatusCode>) -> (String, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let app = Router::new().route(
            "/userinfo",
            get(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                let status = statuses
                    .get(n)
                    .or_else(|| statuses.last())
                    .copied()
                    .unwrap_or(StatusCode::OK);
                async move { status }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        (format!("http://{addr}/userinfo"), calls)
    }

    fn validator(url: String) -> TokenValidator {
        TokenValidator::new(Some(url), Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_service_error_is_not_cached() {
        let (url, calls) =
            userinfo_stub(vec![StatusCode::SERVICE_UNAVAILABLE, StatusCode::OK]).await;
        let validator = validator(url);

        assert!(!validator.validate("token").await);
        assert!(validator.validate("token").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_definite_verdicts_are_cached() {
        let (url, calls) = userinfo_stub(vec![StatusCode::UNAUTHORIZED, StatusCode::OK]).await;
        let validator = validator(url);

        assert!(!validator.validate("revoked").await);
        assert!(!validator.validate("revoked").await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(validator.validate("other").await);
        assert!(validator.validate("other").await);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_validator_accepts_anything() {
        let validator = TokenValidator::new(None, Duration::from_secs(1)).unwrap();
        assert!(!validator.is_enabled());
        assert!(validator.validate("whatever").await);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_rejects() {
        // Port 9 (discard) is closed on loopback in test environments.
        let validator = TokenValidator::new(
            Some("http://127.0.0.1:9/userinfo".to_string()),
            Duration::from_millis(500),
        )
        .unwrap();

        assert!(validator.is_enabled());
        assert!(!validator.validate("token").await);
    }
}
