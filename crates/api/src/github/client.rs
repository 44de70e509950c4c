//! GitHub REST client with local rate limiting.

use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use swag_core::GithubUsername;
use tracing::instrument;
use url::Url;

use super::types::{ErrorResponse, MembershipResponse, SearchResponse};
use super::{GitHubApi, GitHubError, MembershipState, SearchResults};
use crate::config::GitHubConfig;

/// GitHub REST API version header value.
const API_VERSION: &str = "2022-11-28";

/// Longest `Retry-After` we are willing to wait out inside a request.
const MAX_RETRY_WAIT_SECS: u64 = 5;

/// Fallback wait when a rate-limit reply carries no usable hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Results per search page (GitHub maximum).
const SEARCH_PAGE_SIZE: &str = "100";

/// GitHub REST API client.
///
/// Cheap to clone. All requests share one HTTP connection pool and one
/// local rate limiter sized from `GITHUB_REQUESTS_PER_MINUTE`.
#[derive(Clone)]
pub struct GitHubClient {
    inner: Arc<GitHubClientInner>,
}

struct GitHubClientInner {
    client: reqwest::Client,
    base_url: String,
    team_id: String,
    limiter: DefaultDirectRateLimiter,
}

impl GitHubClient {
    /// Create a new GitHub client.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL or token is malformed, or the HTTP
    /// client fails to build.
    pub fn new(config: &GitHubConfig, timeout: Duration) -> Result<Self, GitHubError> {
        Url::parse(&config.api_url)
            .map_err(|e| GitHubError::Parse(format!("Invalid GitHub API URL: {e}")))?;

        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.token.expose_secret()))
                .map_err(|e| GitHubError::Parse(format!("Invalid token format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert("X-GitHub-Api-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(GitHubClientInner {
                client,
                base_url: config.api_url.trim_end_matches('/').to_string(),
                team_id: config.team_id.clone(),
                limiter: RateLimiter::direct(Quota::per_minute(config.requests_per_minute)),
            }),
        })
    }

    fn url(&self, path: &str) -> Result<Url, GitHubError> {
        Url::parse(&format!("{}{path}", self.inner.base_url))
            .map_err(|e| GitHubError::Parse(format!("Invalid request URL: {e}")))
    }

    fn membership_url(&self, username: &GithubUsername) -> Result<Url, GitHubError> {
        self.url(&format!(
            "/teams/{}/memberships/{}",
            self.inner.team_id,
            username.as_str()
        ))
    }

    /// Send a request, waiting on the local limiter first.
    ///
    /// An upstream rate-limit reply is retried once when GitHub asks us to
    /// wait at most [`MAX_RETRY_WAIT_SECS`].
    async fn send<F>(&self, build: F) -> Result<reqwest::Response, GitHubError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut retried = false;

        loop {
            self.inner.limiter.until_ready().await;
            let response = build().send().await?;

            match rate_limit_wait(&response) {
                None => return Ok(response),
                Some(wait) if !retried && wait <= MAX_RETRY_WAIT_SECS => {
                    tracing::warn!(wait_secs = wait, "GitHub rate limit hit, retrying once");
                    retried = true;
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                }
                Some(wait) => return Err(GitHubError::RateLimited(wait)),
            }
        }
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GitHubError> {
        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| GitHubError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    /// Parse error response from the GitHub API.
    async fn parse_error(response: reqwest::Response) -> GitHubError {
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED => GitHubError::Unauthorized,
            StatusCode::NOT_FOUND => GitHubError::NotFound(response.url().path().to_string()),
            _ => {
                let message = response
                    .json::<ErrorResponse>()
                    .await
                    .map(|body| body.message)
                    .unwrap_or_else(|_| {
                        status
                            .canonical_reason()
                            .unwrap_or("Unknown error")
                            .to_string()
                    });
                GitHubError::Api {
                    status: status.as_u16(),
                    message,
                }
            }
        }
    }
}

/// Seconds GitHub asks us to wait, if `response` is a rate-limit reply.
///
/// Primary limits come back as 403 with `x-ratelimit-remaining: 0`, secondary
/// limits as 403 or 429 with `Retry-After`.
fn rate_limit_wait(response: &reqwest::Response) -> Option<u64> {
    let status = response.status();
    if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::FORBIDDEN {
        return None;
    }

    let headers = response.headers();
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
    };

    if let Some(retry_after) = header_u64("retry-after") {
        return Some(retry_after);
    }

    let exhausted = header_u64("x-ratelimit-remaining") == Some(0);
    if exhausted {
        let wait = header_u64("x-ratelimit-reset").map_or(DEFAULT_RETRY_AFTER_SECS, |reset| {
            let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or_default();
            reset.saturating_sub(now)
        });
        return Some(wait);
    }

    (status == StatusCode::TOO_MANY_REQUESTS).then_some(DEFAULT_RETRY_AFTER_SECS)
}

impl GitHubApi for GitHubClient {
    #[instrument(skip(self))]
    async fn search_issues(&self, query: &str) -> Result<SearchResults, GitHubError> {
        let mut url = self.url("/search/issues")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("per_page", SEARCH_PAGE_SIZE);

        let response = self.send(|| self.inner.client.get(url.clone())).await?;
        let body: SearchResponse = Self::handle_response(response).await?;

        tracing::debug!(total_count = body.total_count, "GitHub search complete");
        Ok(body.into())
    }

    #[instrument(skip(self), fields(username = %username))]
    async fn team_membership(
        &self,
        username: &GithubUsername,
    ) -> Result<MembershipState, GitHubError> {
        let url = self.membership_url(username)?;
        let response = self.send(|| self.inner.client.get(url.clone())).await?;
        let body: MembershipResponse = Self::handle_response(response).await?;
        Ok(body.state)
    }

    #[instrument(skip(self), fields(username = %username))]
    async fn add_team_membership(
        &self,
        username: &GithubUsername,
    ) -> Result<MembershipState, GitHubError> {
        let url = self.membership_url(username)?;
        let response = self
            .send(|| {
                self.inner
                    .client
                    .put(url.clone())
                    .json(&serde_json::json!({ "role": "member" }))
            })
            .await?;
        let body: MembershipResponse = Self::handle_response(response).await?;
        Ok(body.state)
    }
}
