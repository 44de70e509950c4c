//! Feedback repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use swag_core::FeedbackId;
use tracing::instrument;

use super::RepositoryError;
use crate::models::{FeedbackInput, FeedbackRecord};

#[derive(Debug, sqlx::FromRow)]
struct FeedbackRow {
    id: i32,
    comment: String,
    rating: i32,
    origin_url: String,
    created_at: DateTime<Utc>,
}

impl From<FeedbackRow> for FeedbackRecord {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: FeedbackId::new(row.id),
            comment: row.comment,
            rating: row.rating,
            origin_url: row.origin_url,
            created_at: row.created_at,
        }
    }
}

/// Repository for site feedback.
#[derive(Clone)]
pub struct FeedbackRepository {
    pool: PgPool,
}

impl FeedbackRepository {
    /// Create a new feedback repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store a feedback entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    #[instrument(skip(self, input), fields(origin_url = %input.origin_url))]
    pub async fn create(&self, input: &FeedbackInput) -> Result<FeedbackRecord, RepositoryError> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            r"
            INSERT INTO feedback (comment, rating, origin_url)
            VALUES ($1, $2, $3)
            RETURNING id, comment, rating, origin_url, created_at
            ",
        )
        .bind(&input.comment)
        .bind(input.rating)
        .bind(&input.origin_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }
}
