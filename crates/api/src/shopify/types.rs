//! Shopify domain and wire types.

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use swag_core::{Email, GithubUsername};

/// Profile used to create a customer.
#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub email: Email,
    pub first_name: String,
    pub accepts_marketing: bool,
    /// Stored in the `global.github` metafield.
    pub github_username: GithubUsername,
    /// Initial tags, normally the earned tier tags.
    pub tags: Vec<String>,
}

/// Tags and used discount codes of one customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerSnapshot {
    pub tags: BTreeSet<String>,
    pub used_discount_codes: BTreeSet<String>,
}

/// A mutation input error, as returned by `customerCreate` and `tagsAdd`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UserError {
    #[serde(default)]
    pub field: Option<Vec<String>>,
    pub message: String,
}

impl fmt::Display for UserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field.as_deref() {
            Some(field) if !field.is_empty() => write!(f, "{}: {}", field.join("."), self.message),
            _ => f.write_str(&self.message),
        }
    }
}

// =============================================================================
// Response data
// =============================================================================

#[derive(Debug, Deserialize)]
pub(super) struct Nodes<T> {
    #[serde(default = "Vec::new")]
    pub nodes: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(super) struct IdNode {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CustomerCreateData {
    pub customer_create: Option<CustomerCreatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CustomerCreatePayload {
    pub customer: Option<IdNode>,
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CustomersData {
    pub customers: Nodes<IdNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TagsAddData {
    pub tags_add: Option<TagsAddPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct TagsAddPayload {
    #[serde(default)]
    pub user_errors: Vec<UserError>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CustomerData {
    pub customer: Option<CustomerNode>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CustomerNode {
    #[serde(default)]
    pub tags: Vec<String>,
    pub orders: Nodes<OrderNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct OrderNode {
    #[serde(default)]
    pub discount_codes: Vec<String>,
}

impl From<CustomerNode> for CustomerSnapshot {
    fn from(node: CustomerNode) -> Self {
        Self {
            tags: node.tags.into_iter().collect(),
            used_discount_codes: node
                .orders
                .nodes
                .into_iter()
                .flat_map(|order| order.discount_codes)
                .collect(),
        }
    }
}
