//! Contributor repository backed by `PostgreSQL`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use swag_core::{ContributorId, CustomerId, Email, GithubUsername};
use tracing::instrument;

use super::{ContributorStore, RepositoryError};
use crate::models::{ContributorRecord, NewContributor};

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for `PostgreSQL` contributor queries.
#[derive(Debug, sqlx::FromRow)]
struct ContributorRow {
    id: i32,
    github_username: String,
    email: Option<String>,
    shopify_customer_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContributorRow> for ContributorRecord {
    type Error = RepositoryError;

    fn try_from(row: ContributorRow) -> Result<Self, Self::Error> {
        let github_username = GithubUsername::parse(&row.github_username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid GitHub username in database: {e}"))
        })?;

        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        let shopify_customer_id = row
            .shopify_customer_id
            .as_deref()
            .map(CustomerId::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid customer ID in database: {e}"))
            })?;

        Ok(Self {
            id: ContributorId::new(row.id),
            github_username,
            email,
            shopify_customer_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for contributor database operations.
#[derive(Clone)]
pub struct ContributorRepository {
    pool: PgPool,
}

impl ContributorRepository {
    /// Create a new contributor repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ContributorStore for ContributorRepository {
    #[instrument(skip(self), fields(username = %username))]
    async fn find_by_username(
        &self,
        username: &GithubUsername,
    ) -> Result<Option<ContributorRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, ContributorRow>(
            r"
            SELECT id, github_username, email, shopify_customer_id, created_at, updated_at
            FROM contributor
            WHERE github_username = $1
            ",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    #[instrument(skip(self, contributor), fields(username = %contributor.github_username))]
    async fn create(
        &self,
        contributor: &NewContributor,
    ) -> Result<ContributorRecord, RepositoryError> {
        let row = sqlx::query_as::<_, ContributorRow>(
            r"
            INSERT INTO contributor (github_username, email, shopify_customer_id)
            VALUES ($1, $2, $3)
            RETURNING id, github_username, email, shopify_customer_id, created_at, updated_at
            ",
        )
        .bind(&contributor.github_username)
        .bind(contributor.email.as_ref())
        .bind(contributor.shopify_customer_id.as_ref())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("GitHub username already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    #[instrument(skip(self, contributor), fields(username = %contributor.github_username))]
    async fn upsert(
        &self,
        contributor: &NewContributor,
    ) -> Result<ContributorRecord, RepositoryError> {
        let row = sqlx::query_as::<_, ContributorRow>(
            r"
            INSERT INTO contributor (github_username, email, shopify_customer_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (github_username) DO UPDATE SET
                email = COALESCE(EXCLUDED.email, contributor.email),
                shopify_customer_id = COALESCE(contributor.shopify_customer_id, EXCLUDED.shopify_customer_id),
                updated_at = NOW()
            RETURNING id, github_username, email, shopify_customer_id, created_at, updated_at
            ",
        )
        .bind(&contributor.github_username)
        .bind(contributor.email.as_ref())
        .bind(contributor.shopify_customer_id.as_ref())
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(username: &str, email: Option<&str>, customer: Option<&str>) -> ContributorRow {
        ContributorRow {
            id: 1,
            github_username: username.to_string(),
            email: email.map(str::to_string),
            shopify_customer_id: customer.map(str::to_string),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_converts_to_record() {
        let record = ContributorRecord::try_from(row(
            "gatsbot",
            Some("team@gatsbyjs.com"),
            Some("gid://shopify/Customer/42"),
        ))
        .unwrap();

        assert_eq!(record.id, ContributorId::new(1));
        assert_eq!(record.github_username.as_str(), "gatsbot");
        assert_eq!(record.email.unwrap().as_str(), "team@gatsbyjs.com");
        assert_eq!(
            record.shopify_customer_id.unwrap().as_str(),
            "gid://shopify/Customer/42"
        );
    }

    #[test]
    fn test_nullable_columns_stay_empty() {
        let record = ContributorRecord::try_from(row("gatsbot", None, None)).unwrap();
        assert!(record.email.is_none());
        assert!(record.shopify_customer_id.is_none());
    }

    #[test]
    fn test_invalid_row_is_data_corruption() {
        let err = ContributorRecord::try_from(row("gatsbot", Some("not-an-email"), None))
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
