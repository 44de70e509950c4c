//! GitHub REST API access.
//!
//! # Capabilities
//!
//! - **Issue search**: merged pull requests per author, open issues per label
//! - **Team membership**: read and invite, used to enrol contributors
//!
//! The rest of the crate talks to GitHub through the [`GitHubApi`] trait so
//! the orchestrator can run against an in-memory fake in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use swag_api::github::{GitHubClient, lookup_contributions};
//!
//! let client = GitHubClient::new(&config.github, config.http_timeout)?;
//! let summary = lookup_contributions(&client, "gatsbyjs", &username).await?;
//! ```

mod client;
mod contributions;
mod membership;
mod types;

pub use client::GitHubClient;
pub use contributions::{
    is_contributor, lookup_contributions, merged_pr_query, open_issues_by_label, open_issues_query,
};
pub use membership::{Membership, MembershipError, invite_if_necessary};
pub use types::{MembershipState, SearchResults};

use std::future::Future;

use swag_core::GithubUsername;
use thiserror::Error;

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by GitHub.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Token rejected.
    #[error("Unauthorized: invalid GitHub token")]
    Unauthorized,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// The GitHub operations the contributor flow depends on.
pub trait GitHubApi: Send + Sync {
    /// Run an issue/pull request search and return the first page.
    fn search_issues(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<SearchResults, GitHubError>> + Send;

    /// Current membership of `username` in the contributor team.
    ///
    /// Returns `GitHubError::NotFound` when the user is not a member.
    fn team_membership(
        &self,
        username: &GithubUsername,
    ) -> impl Future<Output = Result<MembershipState, GitHubError>> + Send;

    /// Add (or invite) `username` to the contributor team.
    fn add_team_membership(
        &self,
        username: &GithubUsername,
    ) -> impl Future<Output = Result<MembershipState, GitHubError>> + Send;
}
