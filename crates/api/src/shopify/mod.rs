//! Shopify Admin API access.
//!
//! # Security
//!
//! The Admin API token can create customers and edit their tags. It is only
//! ever sent to the configured store endpoint.
//!
//! # Architecture
//!
//! - Raw GraphQL documents in [`queries`], sent as `{query, variables}`
//! - [`CommerceApi`] is the seam the orchestrator depends on
//! - [`customers`] holds create-or-reuse, [`tags`] holds tag reconciliation
//!
//! # Example
//!
//! ```rust,ignore
//! use swag_api::shopify::{AdminClient, create_or_reuse_customer};
//!
//! let client = AdminClient::new(&config.shopify, config.http_timeout)?;
//! let resolution = create_or_reuse_customer(&client, &new_customer).await?;
//! ```

mod client;
pub mod customers;
pub mod queries;
pub mod tags;
mod types;

pub use client::AdminClient;
pub use customers::{CustomerError, CustomerResolution, create_or_reuse_customer};
pub use tags::{CustomerCache, TagError, TagReconciler};
pub use types::{CustomerSnapshot, NewCustomer, UserError};

use std::future::Future;
use std::sync::Arc;

use swag_core::{CustomerId, Email};
use thiserror::Error;

/// Wording Shopify uses for a duplicate email.
const EMAIL_TAKEN_MESSAGE: &str = "has already been taken";

/// Errors that can occur when interacting with Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GraphQL query returned errors.
    #[error("GraphQL errors: {}", format_graphql_errors(.0))]
    GraphQL(Vec<GraphQLError>),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The response was well-formed but not what the query asked for.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Authentication/authorization failed.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Mutation rejected its input.
    #[error("User errors: {}", format_user_errors(.0))]
    UserErrors(Vec<UserError>),

    /// An error shared between callers of a de-duplicated fetch.
    #[error(transparent)]
    Shared(Arc<ShopifyError>),
}

impl ShopifyError {
    /// The upstream wording, without our own prefixes.
    ///
    /// Used wherever a Shopify failure is surfaced to a client verbatim.
    #[must_use]
    pub fn upstream_message(&self) -> String {
        match self {
            Self::GraphQL(errors) => format_graphql_errors(errors),
            Self::UserErrors(errors) => errors
                .iter()
                .map(|e| e.message.clone())
                .collect::<Vec<_>>()
                .join("; "),
            Self::Shared(inner) => inner.upstream_message(),
            other => other.to_string(),
        }
    }
}

/// A GraphQL error returned by the Shopify Admin API.
#[derive(Debug, Clone)]
pub struct GraphQLError {
    /// Error message.
    pub message: String,
    /// Source locations in the query.
    pub locations: Vec<GraphQLErrorLocation>,
    /// Path to the error in the response.
    pub path: Vec<serde_json::Value>,
}

/// Location in a GraphQL query where an error occurred.
#[derive(Debug, Clone)]
pub struct GraphQLErrorLocation {
    /// Line number (1-indexed).
    pub line: i64,
    /// Column number (1-indexed).
    pub column: i64,
}

fn format_graphql_errors(errors: &[GraphQLError]) -> String {
    errors
        .iter()
        .map(|e| e.message.clone())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_user_errors(errors: &[UserError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Whether `error` is Shopify refusing a customer because the email exists.
///
/// `customerCreate` returns plain `{field, message}` user errors, so this
/// matches the wording Shopify uses today on the `email` field. An error
/// without a field is accepted on wording alone. If that wording changes,
/// duplicates surface as `CustomerCreationFailed` instead of being reused.
#[must_use]
pub fn is_email_taken(error: &ShopifyError) -> bool {
    match error {
        ShopifyError::UserErrors(errors) => errors.iter().any(|e| {
            let on_email = e
                .field
                .as_deref()
                .is_none_or(|field| field.last().is_some_and(|f| f == "email"));

            on_email && e.message.contains(EMAIL_TAKEN_MESSAGE)
        }),
        ShopifyError::Shared(inner) => is_email_taken(inner),
        _ => false,
    }
}

/// The commerce operations the contributor flow depends on.
pub trait CommerceApi: Send + Sync {
    /// Create a customer and return its ID.
    fn create_customer(
        &self,
        customer: &NewCustomer,
    ) -> impl Future<Output = Result<CustomerId, ShopifyError>> + Send;

    /// IDs of customers whose email matches exactly.
    fn find_customers_by_email(
        &self,
        email: &Email,
    ) -> impl Future<Output = Result<Vec<CustomerId>, ShopifyError>> + Send;

    /// Append tags to a customer. Existing tags are never removed.
    fn add_tags(
        &self,
        id: &CustomerId,
        tags: &[String],
    ) -> impl Future<Output = Result<(), ShopifyError>> + Send;

    /// Current tags and discount codes used on the customer's orders.
    fn customer_snapshot(
        &self,
        id: &CustomerId,
    ) -> impl Future<Output = Result<CustomerSnapshot, ShopifyError>> + Send;
}
