//! Business logic services.
//!
//! - `contributors`: the enrolment orchestrator and contributor queries
//! - `mailchimp`: best-effort mailing list sync

pub mod contributors;
pub mod mailchimp;

pub use contributors::ContributorService;
pub use mailchimp::{ListMember, MailchimpClient, MailchimpError, MailingList};

use swag_core::GithubUsername;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::github::{GitHubError, MembershipError};
use crate::shopify::{CustomerError, ShopifyError, TagError};

/// Failures of contributor operations.
///
/// Display strings are what clients see in `errors`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// GitHub or Shopify could not be reached or answered unexpectedly.
    #[error("{service} is unavailable: {message}")]
    UpstreamUnavailable {
        service: &'static str,
        message: String,
    },

    /// The user has no merged pull requests in the organization.
    #[error("@{username} isn't a contributor to the {org} org")]
    NotAContributor {
        username: GithubUsername,
        org: String,
    },

    /// Creating the commerce customer failed; carries the upstream text.
    #[error("{0}")]
    CustomerCreationFailed(String),

    /// Reusing an existing customer failed.
    #[error("{0}")]
    CustomerLookupFailed(String),

    /// Applying earned tags failed.
    #[error("{0}")]
    TagUpdateFailed(String),

    /// Team invite failed. Logged only; never aborts a flow.
    #[error(transparent)]
    MembershipInviteFailed(#[from] MembershipError),

    /// The contributor store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] RepositoryError),

    /// A record already exists for this GitHub username.
    #[error("An account already exists for the GitHub user @{0}")]
    AccountExists(GithubUsername),
}

impl ServiceError {
    pub(crate) fn github(error: &GitHubError) -> Self {
        Self::UpstreamUnavailable {
            service: "GitHub",
            message: error.to_string(),
        }
    }

    pub(crate) fn shopify(error: &ShopifyError) -> Self {
        Self::UpstreamUnavailable {
            service: "Shopify",
            message: error.to_string(),
        }
    }
}

impl From<CustomerError> for ServiceError {
    fn from(error: CustomerError) -> Self {
        match error {
            CustomerError::CreationFailed { .. } => Self::CustomerCreationFailed(error.to_string()),
            CustomerError::NotFound(_) | CustomerError::Lookup(_) => {
                Self::CustomerLookupFailed(error.to_string())
            }
        }
    }
}

impl From<TagError> for ServiceError {
    fn from(error: TagError) -> Self {
        match error {
            TagError::Fetch { ref source, .. } => Self::shopify(source),
            TagError::UpdateFailed { .. } => Self::TagUpdateFailed(error.to_string()),
        }
    }
}
