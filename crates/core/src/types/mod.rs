//! Core types for the contributor swag backend.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contributor;
pub mod customer;
pub mod discount;
pub mod email;
pub mod github;
pub mod id;

pub use contributor::{Contributor, GitHubInfo, ShopifyInfo};
pub use customer::{CustomerId, CustomerIdError};
pub use discount::{DiscountCodeStatus, DiscountTier, DiscountTierError, DiscountTiers};
pub use email::{Email, EmailError};
pub use github::{
    ContributionSummary, GithubUsername, GithubUsernameError, Label, OpenIssues,
    PullRequestSummary,
};
pub use id::*;
