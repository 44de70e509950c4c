//! In-memory contributor store.
//!
//! Used by tests and by local runs without a database. Behaves like the
//! `PostgreSQL` repository, including the unique username constraint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use swag_core::{ContributorId, GithubUsername};

use super::{ContributorStore, RepositoryError};
use crate::models::{ContributorRecord, NewContributor};

/// Contributor store held in process memory.
#[derive(Clone, Default)]
pub struct InMemoryContributorStore {
    inner: Arc<Mutex<Records>>,
}

#[derive(Default)]
struct Records {
    next_id: i32,
    by_username: HashMap<GithubUsername, ContributorRecord>,
}

impl Records {
    fn insert(&mut self, contributor: &NewContributor) -> ContributorRecord {
        self.next_id += 1;
        let now = Utc::now();
        let record = ContributorRecord {
            id: ContributorId::new(self.next_id),
            github_username: contributor.github_username.clone(),
            email: contributor.email.clone(),
            shopify_customer_id: contributor.shopify_customer_id.clone(),
            created_at: now,
            updated_at: now,
        };
        self.by_username
            .insert(record.github_username.clone(), record.clone());
        record
    }
}

impl InMemoryContributorStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_username
            .len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ContributorStore for InMemoryContributorStore {
    async fn find_by_username(
        &self,
        username: &GithubUsername,
    ) -> Result<Option<ContributorRecord>, RepositoryError> {
        let records = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.by_username.get(username).cloned())
    }

    async fn create(
        &self,
        contributor: &NewContributor,
    ) -> Result<ContributorRecord, RepositoryError> {
        let mut records = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if records.by_username.contains_key(&contributor.github_username) {
            return Err(RepositoryError::Conflict(
                "GitHub username already exists".to_owned(),
            ));
        }
        Ok(records.insert(contributor))
    }

    async fn upsert(
        &self,
        contributor: &NewContributor,
    ) -> Result<ContributorRecord, RepositoryError> {
        let mut records = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(existing) = records.by_username.get_mut(&contributor.github_username) else {
            return Ok(records.insert(contributor));
        };

        if contributor.email.is_some() {
            existing.email.clone_from(&contributor.email);
        }
        if existing.shopify_customer_id.is_none() {
            existing
                .shopify_customer_id
                .clone_from(&contributor.shopify_customer_id);
        }
        existing.updated_at = Utc::now();
        Ok(existing.clone())
    }
}
