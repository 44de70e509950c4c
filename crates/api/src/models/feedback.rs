//! Site feedback.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use swag_core::FeedbackId;

/// Request body for `POST /feedback`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackInput {
    #[serde(default)]
    pub comment: String,
    pub rating: i32,
    pub origin_url: String,
}

/// A stored feedback entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub id: FeedbackId,
    pub comment: String,
    pub rating: i32,
    pub origin_url: String,
    pub created_at: DateTime<Utc>,
}
