//! Contribution lookup and issue search.
//!
//! Only the first page of search results is read. `total_count` is always
//! the full count, so contribution counts are exact even when the list of
//! pull requests is truncated.

use swag_core::{ContributionSummary, GithubUsername, OpenIssues};
use tracing::instrument;

use super::{GitHubApi, GitHubError};

/// Search query for merged pull requests by `username` in `org`.
#[must_use]
pub fn merged_pr_query(org: &str, username: &GithubUsername) -> String {
    format!("org:{org} author:{username} type:pr is:merged")
}

/// Search query for open issues in `org` carrying `label`.
///
/// Double quotes are removed from the label so it cannot close the quoted
/// qualifier early.
#[must_use]
pub fn open_issues_query(org: &str, label: &str) -> String {
    let label = label.replace('"', "");
    format!("org:{org} label:\"{label}\" type:issue is:open")
}

/// Merged pull requests authored by `username` within `org`.
///
/// GitHub answers 422 when `author:` names a login that does not exist;
/// that user has no contributions.
///
/// # Errors
///
/// Returns the underlying `GitHubError` if the search fails.
#[instrument(skip(github), fields(username = %username))]
pub async fn lookup_contributions<G: GitHubApi>(
    github: &G,
    org: &str,
    username: &GithubUsername,
) -> Result<ContributionSummary, GitHubError> {
    tracing::debug!("Loading merged pull requests");

    let results = match github.search_issues(&merged_pr_query(org, username)).await {
        Ok(results) => results,
        Err(GitHubError::Api { status: 422, message }) => {
            tracing::info!(%message, "Search rejected the author, treating as unknown user");
            return Ok(ContributionSummary {
                total_contributions: 0,
                pull_requests: Vec::new(),
            });
        }
        Err(e) => return Err(e),
    };

    if results.items.len() < results.total_count as usize {
        tracing::info!(
            total = results.total_count,
            returned = results.items.len(),
            "Contribution list truncated to first page"
        );
    }

    tracing::debug!(
        contributions = results.total_count,
        "Contribution lookup complete"
    );

    Ok(ContributionSummary {
        total_contributions: results.total_count,
        pull_requests: results.items,
    })
}

/// Whether `username` has at least one merged pull request in `org`.
///
/// # Errors
///
/// Returns the underlying `GitHubError` if the search fails.
pub async fn is_contributor<G: GitHubApi>(
    github: &G,
    org: &str,
    username: &GithubUsername,
) -> Result<bool, GitHubError> {
    Ok(lookup_contributions(github, org, username)
        .await?
        .is_contributor())
}

/// Open issues in `org` labelled `label`.
///
/// # Errors
///
/// Returns the underlying `GitHubError` if the search fails.
#[instrument(skip(github))]
pub async fn open_issues_by_label<G: GitHubApi>(
    github: &G,
    org: &str,
    label: &str,
) -> Result<OpenIssues, GitHubError> {
    let results = github.search_issues(&open_issues_query(org, label)).await?;

    Ok(OpenIssues {
        total_issues: results.total_count,
        issues: results.items,
    })
}
