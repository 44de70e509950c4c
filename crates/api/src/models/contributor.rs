//! Contributor records and enrolment payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swag_core::{ContributorId, CustomerId, Email, GithubUsername};

/// A stored contributor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContributorRecord {
    pub id: ContributorId,
    pub github_username: GithubUsername,
    /// Absent on some records imported from the legacy store.
    pub email: Option<Email>,
    /// Set once by the customer manager and never reassigned.
    pub shopify_customer_id: Option<CustomerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for creating or upserting a contributor record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContributor {
    pub github_username: GithubUsername,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default, rename = "shopifyCustomerID")]
    pub shopify_customer_id: Option<CustomerId>,
}

/// Request body for enrolment (`POST /contributors`, `POST /discount-code`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorInput {
    pub github_username: GithubUsername,
    pub email: Email,
    #[serde(default)]
    pub first_name: String,
    /// Also accepted as `subscribe`.
    #[serde(default, alias = "subscribe")]
    pub accepts_marketing: bool,
}

/// Result of a discount code request.
///
/// `discount_code` is `None` whenever `errors` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCodeResponse {
    pub discount_code: Option<String>,
    pub errors: Vec<String>,
}

impl DiscountCodeResponse {
    /// A successful response carrying `code`.
    #[must_use]
    pub const fn granted(code: Option<String>) -> Self {
        Self {
            discount_code: code,
            errors: Vec::new(),
        }
    }

    /// A response with no code and the given errors.
    #[must_use]
    pub const fn rejected(errors: Vec<String>) -> Self {
        Self {
            discount_code: None,
            errors,
        }
    }
}
