//! Shopify customer identifier.

use core::fmt;

use serde::{Deserialize, Serialize};

const GID_PREFIX: &str = "gid://shopify/Customer/";

/// Errors that can occur when parsing a [`CustomerId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CustomerIdError {
    /// The input is neither a customer GID nor a numeric legacy ID.
    #[error("invalid Shopify customer ID: {0}")]
    Invalid(String),
}

/// Opaque reference to a customer record in Shopify.
///
/// Always stored in GID form (`gid://shopify/Customer/123`). Numeric IDs from
/// the REST API era are accepted and converted.
///
/// ```
/// use swag_core::CustomerId;
///
/// let id = CustomerId::parse("1234567891234").unwrap();
/// assert_eq!(id.as_str(), "gid://shopify/Customer/1234567891234");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct CustomerId(String);

impl CustomerId {
    /// Parse a `CustomerId` from a GID or a numeric legacy ID.
    ///
    /// # Errors
    ///
    /// Returns `CustomerIdError::Invalid` if the numeric part is missing or
    /// contains non-digits.
    pub fn parse(s: &str) -> Result<Self, CustomerIdError> {
        let s = s.trim();
        let numeric = s.strip_prefix(GID_PREFIX).unwrap_or(s);

        if numeric.is_empty() || !numeric.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CustomerIdError::Invalid(s.to_owned()));
        }

        Ok(Self(format!("{GID_PREFIX}{numeric}")))
    }

    /// Returns the GID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric part of the GID.
    #[must_use]
    pub fn numeric(&self) -> &str {
        self.0.strip_prefix(GID_PREFIX).unwrap_or(&self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for CustomerId {
    type Error = CustomerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CustomerId> for String {
    fn from(id: CustomerId) -> Self {
        id.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for CustomerId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for CustomerId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
