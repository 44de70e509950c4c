//! Create-or-reuse for commerce customers.
//!
//! Shopify keeps one customer per email. When creation is refused because
//! the email exists, the existing customer is looked up and reused so a
//! contributor never ends up with two customer records.

use swag_core::{CustomerId, Email};
use thiserror::Error;
use tracing::instrument;

use super::{CommerceApi, NewCustomer, ShopifyError, is_email_taken};

/// How the customer for a request was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerResolution {
    /// A new customer was created.
    Created(CustomerId),
    /// The email already belonged to this customer.
    Reused(CustomerId),
}

impl CustomerResolution {
    /// The resolved customer ID.
    #[must_use]
    pub const fn id(&self) -> &CustomerId {
        match self {
            Self::Created(id) | Self::Reused(id) => id,
        }
    }

    /// Consume the resolution, returning the customer ID.
    #[must_use]
    pub fn into_id(self) -> CustomerId {
        match self {
            Self::Created(id) | Self::Reused(id) => id,
        }
    }
}

/// Errors from [`create_or_reuse_customer`].
#[derive(Debug, Error)]
pub enum CustomerError {
    /// Creation failed for a reason other than a duplicate email.
    ///
    /// Displays the upstream message unchanged.
    #[error("{message}")]
    CreationFailed {
        message: String,
        #[source]
        source: ShopifyError,
    },

    /// Shopify reported the email as taken but returned no customer for it.
    #[error("No customer found with the email {0}")]
    NotFound(Email),

    /// The lookup by email itself failed.
    #[error("Unable to retrieve customers: {0}")]
    Lookup(#[source] ShopifyError),
}

/// Create a customer, or reuse the existing one when the email is taken.
///
/// # Errors
///
/// - `CustomerError::CreationFailed` for any creation failure that is not a
///   duplicate email
/// - `CustomerError::Lookup` if the fallback lookup fails
/// - `CustomerError::NotFound` if the fallback lookup finds nobody
#[instrument(skip(commerce, customer), fields(github_username = %customer.github_username))]
pub async fn create_or_reuse_customer<C: CommerceApi>(
    commerce: &C,
    customer: &NewCustomer,
) -> Result<CustomerResolution, CustomerError> {
    let error = match commerce.create_customer(customer).await {
        Ok(id) => {
            tracing::info!(customer_id = %id, "Created customer");
            return Ok(CustomerResolution::Created(id));
        }
        Err(e) if is_email_taken(&e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Customer creation failed");
            return Err(CustomerError::CreationFailed {
                message: e.upstream_message(),
                source: e,
            });
        }
    };

    tracing::debug!(reason = %error, "Email already registered, looking up customer");

    let matches = commerce
        .find_customers_by_email(&customer.email)
        .await
        .map_err(CustomerError::Lookup)?;

    if matches.len() > 1 {
        tracing::warn!(count = matches.len(), "Several customers share this email, using the first");
    }

    let id = matches
        .into_iter()
        .next()
        .ok_or_else(|| CustomerError::NotFound(customer.email.clone()))?;

    tracing::info!(customer_id = %id, "Reusing existing customer");
    Ok(CustomerResolution::Reused(id))
}
