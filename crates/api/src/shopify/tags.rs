//! Tag reconciliation and discount code status.
//!
//! Both operations read the same customer snapshot. A [`TagReconciler`] is
//! built per request and owns a short-lived cache so one request never
//! fetches the same customer twice, and concurrent readers share a single
//! in-flight fetch.

use std::time::Duration;

use moka::future::Cache;
use swag_core::{CustomerId, DiscountCodeStatus, DiscountTiers};
use thiserror::Error;
use tracing::instrument;

use super::{CommerceApi, CustomerSnapshot, ShopifyError};

/// Lifetime of a cached snapshot.
const SNAPSHOT_TTL: Duration = Duration::from_secs(5);

/// A request only ever touches a handful of customers.
const SNAPSHOT_CAPACITY: u64 = 16;

/// Errors from [`TagReconciler::reconcile`].
#[derive(Debug, Error)]
pub enum TagError {
    /// The customer could not be read.
    #[error("Unable to load customer {id}: {source}")]
    Fetch {
        id: CustomerId,
        #[source]
        source: ShopifyError,
    },

    /// The tag mutation failed or reported user errors.
    #[error("{message}")]
    UpdateFailed {
        message: String,
        #[source]
        source: ShopifyError,
    },
}

/// Request-scoped cache of customer snapshots.
#[derive(Clone)]
pub struct CustomerCache {
    snapshots: Cache<CustomerId, CustomerSnapshot>,
}

impl CustomerCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            snapshots: Cache::builder()
                .max_capacity(SNAPSHOT_CAPACITY)
                .time_to_live(SNAPSHOT_TTL)
                .build(),
        }
    }

    /// Get a snapshot, fetching it at most once while cached.
    ///
    /// # Errors
    ///
    /// Returns the fetch error, shared with any concurrent waiters.
    pub async fn get<C: CommerceApi>(
        &self,
        commerce: &C,
        id: &CustomerId,
    ) -> Result<CustomerSnapshot, ShopifyError> {
        self.snapshots
            .try_get_with(id.clone(), commerce.customer_snapshot(id))
            .await
            .map_err(ShopifyError::Shared)
    }

    /// Replace the cached snapshot after a local write.
    pub async fn insert(&self, id: CustomerId, snapshot: CustomerSnapshot) {
        self.snapshots.insert(id, snapshot).await;
    }
}

impl Default for CustomerCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies earned tier tags and reports code usage for customers.
pub struct TagReconciler<'a, C> {
    commerce: &'a C,
    tiers: &'a DiscountTiers,
    cache: CustomerCache,
}

impl<'a, C: CommerceApi> TagReconciler<'a, C> {
    /// Create a reconciler with a fresh cache.
    #[must_use]
    pub fn new(commerce: &'a C, tiers: &'a DiscountTiers) -> Self {
        Self {
            commerce,
            tiers,
            cache: CustomerCache::new(),
        }
    }

    /// Add every earned tag the customer does not have yet.
    ///
    /// Returns the tags that were added. Existing tags are never removed, and
    /// nothing is sent when no tag is missing.
    ///
    /// # Errors
    ///
    /// Returns `TagError::Fetch` if the customer cannot be read, or
    /// `TagError::UpdateFailed` if the mutation fails.
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn reconcile(
        &self,
        id: &CustomerId,
        contribution_count: u32,
    ) -> Result<Vec<String>, TagError> {
        let mut snapshot = self
            .cache
            .get(self.commerce, id)
            .await
            .map_err(|source| TagError::Fetch {
                id: id.clone(),
                source,
            })?;

        let missing = self.tiers.missing_tags(contribution_count, &snapshot.tags);
        if missing.is_empty() {
            tracing::debug!("Customer already has every earned tag");
            return Ok(missing);
        }

        self.commerce
            .add_tags(id, &missing)
            .await
            .map_err(|source| TagError::UpdateFailed {
                message: format!("Unable to update customer tags: {}", source.upstream_message()),
                source,
            })?;

        tracing::info!(tags = ?missing, "Added customer tags");

        snapshot.tags.extend(missing.iter().cloned());
        self.cache.insert(id.clone(), snapshot).await;

        Ok(missing)
    }

    /// Used/unused status of every code earned with `contribution_count`.
    ///
    /// # Errors
    ///
    /// Returns the Shopify error if the customer cannot be read.
    #[instrument(skip(self), fields(customer_id = %id))]
    pub async fn discount_code_status(
        &self,
        id: &CustomerId,
        contribution_count: u32,
    ) -> Result<Vec<DiscountCodeStatus>, ShopifyError> {
        let snapshot = self.cache.get(self.commerce, id).await?;
        Ok(self
            .tiers
            .code_status(contribution_count, &snapshot.used_discount_codes))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::testing::FakeCommerce;

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_reconcile_adds_only_missing_tags() {
        let commerce = FakeCommerce::new();
        let id = commerce.seed_customer("seeded@example.com", tags(&["contributor", "vip"]), tags(&[]));
        let tiers = DiscountTiers::default();
        let reconciler = TagReconciler::new(&commerce, &tiers);

        let added = reconciler.reconcile(&id, 5).await.unwrap();

        assert_eq!(added, vec!["level2".to_string()]);
        assert_eq!(commerce.tag_mutations(), vec![vec!["level2".to_string()]]);
        let snapshot = commerce.snapshot_of(&id).unwrap();
        assert_eq!(snapshot.tags, tags(&["contributor", "level2", "vip"]));
    }

    #[tokio::test]
    async fn test_second_pass_is_a_no_op() {
        let commerce = FakeCommerce::new();
        let id = commerce.seed_customer("seeded@example.com", tags(&[]), tags(&[]));
        let tiers = DiscountTiers::default();
        let reconciler = TagReconciler::new(&commerce, &tiers);

        reconciler.reconcile(&id, 5).await.unwrap();
        let second = reconciler.reconcile(&id, 5).await.unwrap();

        assert!(second.is_empty());
        assert_eq!(commerce.tag_mutations().len(), 1);
        assert_eq!(commerce.snapshot_fetches(), 1);

        // A fresh reconciler sees the tags upstream and stays quiet too.
        TagReconciler::new(&commerce, &tiers).reconcile(&id, 5).await.unwrap();
        assert_eq!(commerce.tag_mutations().len(), 1);
    }

    #[tokio::test]
    async fn test_tag_user_errors_fail_update() {
        let commerce = FakeCommerce::new().failing_tags("Tags is invalid");
        let id = commerce.seed_customer("seeded@example.com", tags(&[]), tags(&[]));
        let tiers = DiscountTiers::default();

        let err = TagReconciler::new(&commerce, &tiers)
            .reconcile(&id, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, TagError::UpdateFailed { .. }));
        assert_eq!(err.to_string(), "Unable to update customer tags: Tags is invalid");
    }

    #[tokio::test]
    async fn test_discount_code_status_reuses_snapshot() {
        let commerce = FakeCommerce::new();
        let id = commerce.seed_customer(
            "seeded@example.com",
            tags(&["contributor"]),
            tags(&["BUILDWITHGATSBY"]),
        );
        let tiers = DiscountTiers::default();
        let reconciler = TagReconciler::new(&commerce, &tiers);

        reconciler.reconcile(&id, 5).await.unwrap();
        let status = reconciler.discount_code_status(&id, 5).await.unwrap();

        assert_eq!(status.len(), 2);
        assert!(status[0].used);
        assert!(!status[1].used);
        assert_eq!(commerce.snapshot_fetches(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let commerce = FakeCommerce::new();
        let id = commerce.seed_customer("seeded@example.com", tags(&[]), tags(&[]));
        let tiers = DiscountTiers::default();
        let reconciler = TagReconciler::new(&commerce, &tiers);

        let (a, b) = tokio::join!(
            reconciler.discount_code_status(&id, 1),
            reconciler.discount_code_status(&id, 1)
        );

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(commerce.snapshot_fetches(), 1);
    }

    #[tokio::test]
    async fn test_missing_customer_fails_fetch() {
        let commerce = FakeCommerce::new();
        let id = CustomerId::parse("404").unwrap();
        let tiers = DiscountTiers::default();

        let err = TagReconciler::new(&commerce, &tiers)
            .reconcile(&id, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, TagError::Fetch { .. }));
    }
}
