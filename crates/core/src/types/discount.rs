//! Discount tiers and the tier calculator.
//!
//! A tier pairs a Shopify discount code with the customer tag that unlocks it
//! and the number of merged pull requests needed to earn it. The table is
//! static configuration; everything here is pure.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

/// Errors raised when a tier table violates its invariants.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountTierError {
    /// Thresholds must be strictly increasing.
    #[error("tier '{code}' has threshold {threshold}, which does not exceed the previous tier")]
    ThresholdNotIncreasing {
        /// Offending tier code.
        code: String,
        /// Offending threshold.
        threshold: u32,
    },
    /// A zero threshold would grant codes to non-contributors.
    #[error("tier '{0}' has a threshold of zero")]
    ZeroThreshold(String),
    /// Codes must be unique.
    #[error("discount code '{0}' appears more than once")]
    DuplicateCode(String),
    /// Tags must be unique.
    #[error("customer tag '{0}' appears more than once")]
    DuplicateTag(String),
    /// Codes and tags must be non-empty.
    #[error("tier codes and tags cannot be empty")]
    EmptyField,
}

/// One rung of the discount ladder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountTier {
    /// Shopify discount code, e.g. `BUILDWITHGATSBY`.
    pub code: String,
    /// Minimum number of merged pull requests.
    pub threshold: u32,
    /// Customer tag the discount is restricted to.
    pub tag: String,
}

impl DiscountTier {
    fn new(code: &str, threshold: u32, tag: &str) -> Self {
        Self {
            code: code.to_owned(),
            threshold,
            tag: tag.to_owned(),
        }
    }
}

/// Whether an earned code shows up in the customer's order history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountCodeStatus {
    pub code: String,
    pub used: bool,
}

/// Validated tier table, ordered ascending by threshold.
///
/// ```
/// use swag_core::DiscountTiers;
///
/// let tiers = DiscountTiers::default();
/// assert!(tiers.earned(0).is_empty());
/// assert_eq!(tiers.earned(1).len(), 1);
/// assert_eq!(tiers.earned(5).len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DiscountTier>", into = "Vec<DiscountTier>")]
pub struct DiscountTiers(Vec<DiscountTier>);

impl DiscountTiers {
    /// Build a table, checking that thresholds are positive and strictly
    /// increasing and that codes and tags are unique.
    ///
    /// # Errors
    ///
    /// Returns the first invariant violation found.
    pub fn new(tiers: Vec<DiscountTier>) -> Result<Self, DiscountTierError> {
        let mut codes = HashSet::new();
        let mut tags = HashSet::new();
        let mut previous: Option<u32> = None;

        for tier in &tiers {
            if tier.code.is_empty() || tier.tag.is_empty() {
                return Err(DiscountTierError::EmptyField);
            }
            if tier.threshold == 0 {
                return Err(DiscountTierError::ZeroThreshold(tier.code.clone()));
            }
            if previous.is_some_and(|p| tier.threshold <= p) {
                return Err(DiscountTierError::ThresholdNotIncreasing {
                    code: tier.code.clone(),
                    threshold: tier.threshold,
                });
            }
            if !codes.insert(tier.code.as_str()) {
                return Err(DiscountTierError::DuplicateCode(tier.code.clone()));
            }
            if !tags.insert(tier.tag.as_str()) {
                return Err(DiscountTierError::DuplicateTag(tier.tag.clone()));
            }
            previous = Some(tier.threshold);
        }

        Ok(Self(tiers))
    }

    /// All configured tiers in ascending threshold order.
    #[must_use]
    pub fn all(&self) -> &[DiscountTier] {
        &self.0
    }

    /// Tiers earned with `contribution_count` merged pull requests.
    ///
    /// Because thresholds are strictly increasing, the earned tiers are always
    /// a prefix of the table, which makes the result monotonic in the count.
    #[must_use]
    pub fn earned(&self, contribution_count: u32) -> &[DiscountTier] {
        let end = self
            .0
            .partition_point(|tier| tier.threshold <= contribution_count);
        self.0.get(..end).unwrap_or_default()
    }

    /// The most valuable tier earned, if any.
    #[must_use]
    pub fn highest_earned(&self, contribution_count: u32) -> Option<&DiscountTier> {
        self.earned(contribution_count).last()
    }

    /// Tags for every earned tier.
    #[must_use]
    pub fn earned_tags(&self, contribution_count: u32) -> Vec<String> {
        self.earned(contribution_count)
            .iter()
            .map(|tier| tier.tag.clone())
            .collect()
    }

    /// Earned tags not already present in `current_tags`, in tier order.
    #[must_use]
    pub fn missing_tags(&self, contribution_count: u32, current_tags: &BTreeSet<String>) -> Vec<String> {
        self.earned(contribution_count)
            .iter()
            .filter(|tier| !current_tags.contains(&tier.tag))
            .map(|tier| tier.tag.clone())
            .collect()
    }

    /// Used/unused status of every earned code.
    #[must_use]
    pub fn code_status(
        &self,
        contribution_count: u32,
        used_codes: &BTreeSet<String>,
    ) -> Vec<DiscountCodeStatus> {
        self.earned(contribution_count)
            .iter()
            .map(|tier| DiscountCodeStatus {
                code: tier.code.clone(),
                used: used_codes.contains(&tier.code),
            })
            .collect()
    }
}

impl Default for DiscountTiers {
    fn default() -> Self {
        Self(vec![
            DiscountTier::new("BUILDWITHGATSBY", 1, "contributor"),
            DiscountTier::new("LEVEL2", 5, "level2"),
        ])
    }
}

impl TryFrom<Vec<DiscountTier>> for DiscountTiers {
    type Error = DiscountTierError;

    fn try_from(value: Vec<DiscountTier>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountTiers> for Vec<DiscountTier> {
    fn from(tiers: DiscountTiers) -> Self {
        tiers.0
    }
}
