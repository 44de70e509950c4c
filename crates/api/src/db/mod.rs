//! Database operations for the contributor store.
//!
//! ## Tables
//!
//! - `contributor` - One row per enrolled GitHub user (unique username)
//! - `feedback` - Site feedback submitted through the public endpoint
//!
//! # Migrations
//!
//! Migrations are stored in `crates/api/migrations/` and run via:
//! ```bash
//! cargo run -p swag-cli -- migrate
//! ```

pub mod contributors;
pub mod feedback;
pub mod memory;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use swag_core::GithubUsername;
use thiserror::Error;

pub use contributors::ContributorRepository;
pub use feedback::FeedbackRepository;
pub use memory::InMemoryContributorStore;

use crate::models::{ContributorRecord, NewContributor};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unique GitHub username).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Keyed store of contributor records.
pub trait ContributorStore: Send + Sync {
    /// Find the record for `username`.
    fn find_by_username(
        &self,
        username: &GithubUsername,
    ) -> impl Future<Output = Result<Option<ContributorRecord>, RepositoryError>> + Send;

    /// Insert a new record.
    ///
    /// Returns `RepositoryError::Conflict` if the username already exists.
    fn create(
        &self,
        contributor: &NewContributor,
    ) -> impl Future<Output = Result<ContributorRecord, RepositoryError>> + Send;

    /// Insert, or update the record with the same username.
    ///
    /// An existing `shopify_customer_id` is kept; the email is refreshed
    /// when one is supplied.
    fn upsert(
        &self,
        contributor: &NewContributor,
    ) -> impl Future<Output = Result<ContributorRecord, RepositoryError>> + Send;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
