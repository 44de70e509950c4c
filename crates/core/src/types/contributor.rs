//! The unified contributor view returned to clients.

use serde::{Deserialize, Serialize};

use super::{
    ContributionSummary, CustomerId, DiscountCodeStatus, Email, GithubUsername,
    PullRequestSummary,
};

/// GitHub details embedded in a [`Contributor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubInfo {
    pub username: GithubUsername,
    pub contribution_count: u32,
    pub pull_requests: Vec<PullRequestSummary>,
}

impl GitHubInfo {
    /// Build from a search result for `username`.
    #[must_use]
    pub fn from_summary(username: GithubUsername, summary: ContributionSummary) -> Self {
        Self {
            username,
            contribution_count: summary.total_contributions,
            pull_requests: summary.pull_requests,
        }
    }
}

/// Shopify details embedded in a [`Contributor`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopifyInfo {
    pub id: CustomerId,
    pub codes: Vec<DiscountCodeStatus>,
}

/// A contributor as seen by clients: the stored record (if any) joined with
/// live GitHub and Shopify data.
///
/// `email` and `shopify_customer_id` are absent when no record has been
/// created for the username yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contributor {
    pub github_username: GithubUsername,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
    #[serde(
        rename = "shopifyCustomerID",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub shopify_customer_id: Option<CustomerId>,
    pub github: GitHubInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shopify: Option<ShopifyInfo>,
}
