//! GitHub REST response types.

use serde::Deserialize;
use swag_core::{Label, PullRequestSummary};

/// First page of an issue search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    /// Total matches across all pages.
    pub total_count: u32,
    /// Items on the first page.
    pub items: Vec<PullRequestSummary>,
}

/// State of a team membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipState {
    /// The user is a member of the team.
    Active,
    /// The user has been invited and has not accepted yet.
    Pending,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchResponse {
    pub total_count: u32,
    #[serde(default)]
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchItem {
    pub id: u64,
    pub title: String,
    pub html_url: String,
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<SearchLabel>,
}

#[derive(Debug, Deserialize)]
pub(super) struct SearchLabel {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct MembershipResponse {
    pub state: MembershipState,
}

#[derive(Debug, Deserialize)]
pub(super) struct ErrorResponse {
    pub message: String,
}

impl From<SearchItem> for PullRequestSummary {
    fn from(item: SearchItem) -> Self {
        Self {
            id: item.id,
            title: item.title,
            url: item.html_url,
            number: item.number,
            labels: item
                .labels
                .into_iter()
                .map(|label| Label {
                    name: label.name,
                    url: label.url,
                })
                .collect(),
        }
    }
}

impl From<SearchResponse> for SearchResults {
    fn from(response: SearchResponse) -> Self {
        Self {
            total_count: response.total_count,
            items: response.items.into_iter().map(Into::into).collect(),
        }
    }
}
