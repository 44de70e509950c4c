//! Contributor enrolment and lookup.
//!
//! # Enrolment
//!
//! 1. Look up merged pull requests (a failure here is returned as an error)
//! 2. Stop with `NotAContributor` when there are none
//! 3. Invite to the GitHub team and create-or-reuse the Shopify customer
//!    concurrently; the invite is best-effort
//! 4. Record the contributor
//! 5. Add any earned tags the customer is missing
//! 6. Subscribe to the mailing list when asked (best-effort)
//!
//! Nothing is rolled back when a later step fails. A discount code request
//! reports the failure in `errors` and returns no code.

use swag_core::{
    ContributionSummary, Contributor, DiscountTiers, GitHubInfo, GithubUsername, OpenIssues,
    ShopifyInfo,
};
use tracing::instrument;

use super::{ListMember, MailingList, ServiceError};
use crate::db::{ContributorStore, RepositoryError};
use crate::github::{self, GitHubApi, Membership};
use crate::models::{ContributorInput, DiscountCodeResponse, NewContributor};
use crate::shopify::{CommerceApi, NewCustomer, TagReconciler, create_or_reuse_customer};

/// How the enrolment writes the contributor record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    /// Insert or refresh; repeat requests are expected.
    Upsert,
    /// Insert only; an existing username is an error.
    Create,
}

/// Orchestrates GitHub, Shopify, the contributor store and the mailing list.
pub struct ContributorService<G, C, S, M> {
    github: G,
    commerce: C,
    store: S,
    mailing_list: Option<M>,
    org: String,
    tiers: DiscountTiers,
}

impl<G, C, S, M> ContributorService<G, C, S, M>
where
    G: GitHubApi,
    C: CommerceApi,
    S: ContributorStore,
    M: MailingList,
{
    /// Create a service from its collaborators.
    #[must_use]
    pub const fn new(
        github: G,
        commerce: C,
        store: S,
        mailing_list: Option<M>,
        org: String,
        tiers: DiscountTiers,
    ) -> Self {
        Self {
            github,
            commerce,
            store,
            mailing_list,
            org,
            tiers,
        }
    }

    /// Organization contributions are counted against.
    #[must_use]
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Merged pull requests of `username` in the organization.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::UpstreamUnavailable` if GitHub fails.
    pub async fn contribution_summary(
        &self,
        username: &GithubUsername,
    ) -> Result<ContributionSummary, ServiceError> {
        github::lookup_contributions(&self.github, &self.org, username)
            .await
            .map_err(|e| ServiceError::github(&e))
    }

    /// Open issues in the organization carrying `label`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::UpstreamUnavailable` if GitHub fails.
    pub async fn open_issues(&self, label: &str) -> Result<OpenIssues, ServiceError> {
        github::open_issues_by_label(&self.github, &self.org, label)
            .await
            .map_err(|e| ServiceError::github(&e))
    }

    /// The stored record for `username` joined with live GitHub data and,
    /// when the record has a customer, the status of every earned code.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::UpstreamUnavailable` if GitHub or Shopify
    /// fails, or `ServiceError::Storage` if the store does.
    #[instrument(skip(self), fields(username = %username))]
    pub async fn get_contributor(
        &self,
        username: &GithubUsername,
    ) -> Result<Contributor, ServiceError> {
        let (record, summary) = tokio::join!(
            self.store.find_by_username(username),
            self.contribution_summary(username)
        );
        let summary = summary?;
        let record = record?;

        let count = summary.total_contributions;
        let github = GitHubInfo::from_summary(username.clone(), summary);

        let Some(record) = record else {
            return Ok(Contributor {
                github_username: username.clone(),
                email: None,
                shopify_customer_id: None,
                github,
                shopify: None,
            });
        };

        let shopify = match &record.shopify_customer_id {
            Some(id) => {
                let codes = TagReconciler::new(&self.commerce, &self.tiers)
                    .discount_code_status(id, count)
                    .await
                    .map_err(|e| ServiceError::shopify(&e))?;
                Some(ShopifyInfo {
                    id: id.clone(),
                    codes,
                })
            }
            None => None,
        };

        Ok(Contributor {
            github_username: record.github_username,
            email: record.email,
            shopify_customer_id: record.shopify_customer_id,
            github,
            shopify,
        })
    }

    /// Enrol a contributor and return the code of the highest earned tier.
    ///
    /// Business failures come back as a response with `errors` and no code.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::UpstreamUnavailable` if the contribution
    /// lookup itself fails.
    #[instrument(skip(self, input), fields(username = %input.github_username))]
    pub async fn request_discount_code(
        &self,
        input: &ContributorInput,
    ) -> Result<DiscountCodeResponse, ServiceError> {
        tracing::info!("Discount code requested");

        let summary = self.contribution_summary(&input.github_username).await?;

        if !summary.is_contributor() {
            tracing::info!("Not a contributor");
            let rejection = self.not_a_contributor(&input.github_username);
            return Ok(DiscountCodeResponse::rejected(vec![rejection.to_string()]));
        }

        let count = summary.total_contributions;
        match self.enrol(input, summary, Persist::Upsert).await {
            Ok(_) => {
                let code = self.tiers.highest_earned(count).map(|tier| tier.code.clone());
                tracing::info!(code = ?code, "Discount code granted");
                Ok(DiscountCodeResponse::granted(code))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discount code request failed");
                Ok(DiscountCodeResponse::rejected(vec![e.to_string()]))
            }
        }
    }

    /// Enrol a new contributor and return their unified view.
    ///
    /// # Errors
    ///
    /// - `ServiceError::AccountExists` if a record exists for the username
    /// - `ServiceError::NotAContributor` if the user has no merged pull requests
    /// - any fatal enrolment failure
    #[instrument(skip(self, input), fields(username = %input.github_username))]
    pub async fn create_contributor(
        &self,
        input: &ContributorInput,
    ) -> Result<Contributor, ServiceError> {
        if self
            .store
            .find_by_username(&input.github_username)
            .await?
            .is_some()
        {
            return Err(ServiceError::AccountExists(input.github_username.clone()));
        }

        let summary = self.contribution_summary(&input.github_username).await?;

        if !summary.is_contributor() {
            return Err(self.not_a_contributor(&input.github_username));
        }

        self.enrol(input, summary, Persist::Create).await
    }

    fn not_a_contributor(&self, username: &GithubUsername) -> ServiceError {
        ServiceError::NotAContributor {
            username: username.clone(),
            org: self.org.clone(),
        }
    }

    async fn enrol(
        &self,
        input: &ContributorInput,
        summary: ContributionSummary,
        persist: Persist,
    ) -> Result<Contributor, ServiceError> {
        let username = &input.github_username;
        let count = summary.total_contributions;

        let new_customer = NewCustomer {
            email: input.email.clone(),
            first_name: input.first_name.clone(),
            accepts_marketing: input.accepts_marketing,
            github_username: username.clone(),
            tags: self.tiers.earned_tags(count),
        };

        let (membership, customer) = tokio::join!(
            github::invite_if_necessary(&self.github, username),
            create_or_reuse_customer(&self.commerce, &new_customer)
        );

        match membership {
            Ok(Membership::Invited) => tracing::info!("Team invite sent"),
            Ok(_) => {}
            Err(e) => {
                let e = ServiceError::from(e);
                tracing::warn!(error = %e, "Team invite failed, continuing");
            }
        }

        let customer_id = customer?.into_id();

        let record = NewContributor {
            github_username: username.clone(),
            email: Some(input.email.clone()),
            shopify_customer_id: Some(customer_id.clone()),
        };

        let stored = match persist {
            Persist::Upsert => self.store.upsert(&record).await?,
            Persist::Create => self.store.create(&record).await.map_err(|e| match e {
                RepositoryError::Conflict(_) => ServiceError::AccountExists(username.clone()),
                other => ServiceError::Storage(other),
            })?,
        };

        // The stored customer wins; it is never reassigned.
        let customer_id = match stored.shopify_customer_id {
            Some(existing) if existing != customer_id => {
                tracing::warn!(
                    stored = %existing,
                    resolved = %customer_id,
                    "Contributor is linked to a different customer, keeping the stored one"
                );
                existing
            }
            _ => customer_id,
        };

        let reconciler = TagReconciler::new(&self.commerce, &self.tiers);
        reconciler.reconcile(&customer_id, count).await?;

        self.sync_mailing_list(input).await;

        let codes = reconciler
            .discount_code_status(&customer_id, count)
            .await
            .map_err(|e| ServiceError::shopify(&e))?;

        Ok(Contributor {
            github_username: username.clone(),
            email: stored.email,
            shopify_customer_id: Some(customer_id.clone()),
            github: GitHubInfo::from_summary(username.clone(), summary),
            shopify: Some(ShopifyInfo {
                id: customer_id,
                codes,
            }),
        })
    }

    async fn sync_mailing_list(&self, input: &ContributorInput) {
        if !input.accepts_marketing {
            return;
        }

        let Some(list) = &self.mailing_list else {
            tracing::debug!("Mailing list not configured, skipping subscription");
            return;
        };

        let member = ListMember {
            email: input.email.clone(),
            first_name: input.first_name.clone(),
            github_username: input.github_username.clone(),
        };

        if let Err(e) = list.subscribe(&member).await {
            tracing::warn!(error = %e, "Mailing list subscription failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeSet;

    use swag_core::{DiscountCodeStatus, Email};

    use super::*;
    use crate::db::InMemoryContributorStore;
    use crate::github::{GitHubError, MembershipState};
    use crate::testing::{FakeCommerce, FakeGitHub, FakeMailingList, ORG};

    type TestService =
        ContributorService<FakeGitHub, FakeCommerce, InMemoryContributorStore, FakeMailingList>;

    struct Harness {
        service: TestService,
        commerce: FakeCommerce,
        store: InMemoryContributorStore,
        mailing_list: FakeMailingList,
    }

    fn harness(github: FakeGitHub, commerce: FakeCommerce) -> Harness {
        harness_with_list(github, commerce, FakeMailingList::new())
    }

    fn harness_with_list(
        github: FakeGitHub,
        commerce: FakeCommerce,
        mailing_list: FakeMailingList,
    ) -> Harness {
        let store = InMemoryContributorStore::new();
        let service = ContributorService::new(
            github,
            commerce.clone(),
            store.clone(),
            Some(mailing_list.clone()),
            ORG.to_string(),
            DiscountTiers::default(),
        );
        Harness {
            service,
            commerce,
            store,
            mailing_list,
        }
    }

    fn input(username: &str, email: &str) -> ContributorInput {
        ContributorInput {
            github_username: GithubUsername::parse(username).unwrap(),
            email: Email::parse(email).unwrap(),
            first_name: "Gatsby".to_string(),
            accepts_marketing: false,
        }
    }

    fn tags(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[tokio::test]
    async fn test_non_contributor_gets_explanation() {
        let h = harness(FakeGitHub::new().with_contributions("nobody", 0), FakeCommerce::new());

        let response = h
            .service
            .request_discount_code(&input("nobody", "nobody@example.com"))
            .await
            .unwrap();

        assert_eq!(
            response,
            DiscountCodeResponse {
                discount_code: None,
                errors: vec!["@nobody isn't a contributor to the gatsbyjs org".to_string()],
            }
        );
        assert_eq!(h.commerce.customer_count(), 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_first_time_contributor_gets_code() {
        let h = harness(FakeGitHub::new().with_contributions("newbie", 1), FakeCommerce::new());

        let response = h
            .service
            .request_discount_code(&input("newbie", "newbie@example.com"))
            .await
            .unwrap();

        assert_eq!(response, DiscountCodeResponse::granted(Some("BUILDWITHGATSBY".to_string())));
        assert_eq!(h.commerce.customer_count(), 1);

        let id = h
            .commerce
            .find_customers_by_email(&Email::parse("newbie@example.com").unwrap())
            .await
            .unwrap()
            .remove(0);
        assert_eq!(h.commerce.snapshot_of(&id).unwrap().tags, tags(&["contributor"]));

        // Seeded on creation, so reconciliation had nothing to add.
        assert!(h.commerce.tag_mutations().is_empty());

        let record = h
            .store
            .find_by_username(&GithubUsername::parse("newbie").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.shopify_customer_id, Some(id));
    }

    #[tokio::test]
    async fn test_existing_customer_is_reused_and_tagged() {
        let commerce = FakeCommerce::new();
        let existing = commerce.seed_customer("veteran@example.com", tags(&["vip"]), tags(&[]));
        let h = harness(FakeGitHub::new().with_contributions("veteran", 5), commerce);

        let response = h
            .service
            .request_discount_code(&input("veteran", "veteran@example.com"))
            .await
            .unwrap();

        assert_eq!(response, DiscountCodeResponse::granted(Some("LEVEL2".to_string())));
        assert_eq!(h.commerce.customer_count(), 1);
        assert_eq!(
            h.commerce.snapshot_of(&existing).unwrap().tags,
            tags(&["contributor", "level2", "vip"])
        );

        let contributor = h
            .service
            .get_contributor(&GithubUsername::parse("veteran").unwrap())
            .await
            .unwrap();
        assert_eq!(contributor.shopify_customer_id, Some(existing));
        assert_eq!(
            contributor.shopify.unwrap().codes,
            vec![
                DiscountCodeStatus {
                    code: "BUILDWITHGATSBY".to_string(),
                    used: false
                },
                DiscountCodeStatus {
                    code: "LEVEL2".to_string(),
                    used: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_unrelated_creation_error_is_surfaced() {
        let h = harness(
            FakeGitHub::new().with_contributions("unlucky", 1),
            FakeCommerce::new().failing_create("some other error"),
        );

        let response = h
            .service
            .request_discount_code(&input("unlucky", "unlucky@example.com"))
            .await
            .unwrap();

        assert_eq!(
            response,
            DiscountCodeResponse::rejected(vec!["some other error".to_string()])
        );
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_tag_failure_withholds_code() {
        let commerce = FakeCommerce::new().failing_tags("Tags is invalid");
        commerce.seed_customer("tagless@example.com", tags(&[]), tags(&[]));
        let h = harness(FakeGitHub::new().with_contributions("tagless", 1), commerce);

        let response = h
            .service
            .request_discount_code(&input("tagless", "tagless@example.com"))
            .await
            .unwrap();

        assert_eq!(response.discount_code, None);
        assert_eq!(
            response.errors,
            vec!["Unable to update customer tags: Tags is invalid".to_string()]
        );
    }

    #[tokio::test]
    async fn test_github_outage_is_an_error() {
        let h = harness(FakeGitHub::new().failing_search(), FakeCommerce::new());

        let err = h
            .service
            .request_discount_code(&input("gatsbot", "team@gatsbyjs.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::UpstreamUnavailable { service: "GitHub", .. }));
    }

    #[tokio::test]
    async fn test_nonexistent_login_gets_explanation() {
        let h = harness(FakeGitHub::new().failing_search_with(422), FakeCommerce::new());

        let response = h
            .service
            .request_discount_code(&input("typo-login", "typo@example.com"))
            .await
            .unwrap();

        assert_eq!(
            response,
            DiscountCodeResponse::rejected(vec![
                "@typo-login isn't a contributor to the gatsbyjs org".to_string()
            ])
        );
        assert_eq!(h.commerce.customer_count(), 0);
    }

    #[tokio::test]
    async fn test_invite_failure_does_not_block_code() {
        let github = FakeGitHub::new()
            .with_contributions("gatsbot", 2)
            .with_membership(Err(GitHubError::Api {
                status: 500,
                message: "Server Error".to_string(),
            }));
        let h = harness(github, FakeCommerce::new());

        let response = h
            .service
            .request_discount_code(&input("gatsbot", "team@gatsbyjs.com"))
            .await
            .unwrap();

        assert_eq!(response, DiscountCodeResponse::granted(Some("BUILDWITHGATSBY".to_string())));
    }

    #[tokio::test]
    async fn test_repeat_request_is_idempotent() {
        let github = FakeGitHub::new()
            .with_contributions("gatsbot", 5)
            .with_membership(Ok(MembershipState::Active));
        let h = harness(github, FakeCommerce::new());
        let request = input("gatsbot", "team@gatsbyjs.com");

        let first = h.service.request_discount_code(&request).await.unwrap();
        let second = h.service.request_discount_code(&request).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(h.commerce.customer_count(), 1);
        assert!(h.commerce.tag_mutations().is_empty());
        assert_eq!(h.store.len(), 1);
    }

    #[tokio::test]
    async fn test_mailing_list_follows_consent() {
        let h = harness(FakeGitHub::new().with_contributions("gatsbot", 1), FakeCommerce::new());

        let mut request = input("gatsbot", "team@gatsbyjs.com");
        h.service.request_discount_code(&request).await.unwrap();
        assert!(h.mailing_list.members().is_empty());

        request.accepts_marketing = true;
        h.service.request_discount_code(&request).await.unwrap();
        let members = h.mailing_list.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].github_username.as_str(), "gatsbot");
    }

    #[tokio::test]
    async fn test_mailing_list_failure_is_not_reported() {
        let h = harness_with_list(
            FakeGitHub::new().with_contributions("gatsbot", 1),
            FakeCommerce::new(),
            FakeMailingList::failing(),
        );
        let mut request = input("gatsbot", "team@gatsbyjs.com");
        request.accepts_marketing = true;

        let response = h.service.request_discount_code(&request).await.unwrap();

        assert!(response.errors.is_empty());
        assert!(response.discount_code.is_some());
    }

    #[tokio::test]
    async fn test_create_contributor_returns_view() {
        let h = harness(FakeGitHub::new().with_contributions("gatsbot", 5), FakeCommerce::new());

        let contributor = h
            .service
            .create_contributor(&input("gatsbot", "team@gatsbyjs.com"))
            .await
            .unwrap();

        assert_eq!(contributor.github.contribution_count, 5);
        assert_eq!(contributor.email.unwrap().as_str(), "team@gatsbyjs.com");
        let shopify = contributor.shopify.unwrap();
        assert_eq!(Some(shopify.id), contributor.shopify_customer_id);
        assert_eq!(shopify.codes.len(), 2);
    }

    #[tokio::test]
    async fn test_create_contributor_rejects_existing_username() {
        let h = harness(FakeGitHub::new().with_contributions("gatsbot", 1), FakeCommerce::new());
        let request = input("gatsbot", "team@gatsbyjs.com");

        h.service.create_contributor(&request).await.unwrap();
        let err = h.service.create_contributor(&request).await.unwrap_err();

        assert!(matches!(err, ServiceError::AccountExists(_)));
        assert_eq!(
            err.to_string(),
            "An account already exists for the GitHub user @gatsbot"
        );
    }

    #[tokio::test]
    async fn test_create_contributor_rejects_non_contributor() {
        let h = harness(FakeGitHub::new().with_contributions("nobody", 0), FakeCommerce::new());

        let err = h
            .service
            .create_contributor(&input("nobody", "nobody@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotAContributor { .. }));
        assert_eq!(h.commerce.customer_count(), 0);
    }

    #[tokio::test]
    async fn test_get_contributor_without_record_has_github_only() {
        let h = harness(FakeGitHub::new().with_contributions("lurker", 3), FakeCommerce::new());

        let contributor = h
            .service
            .get_contributor(&GithubUsername::parse("lurker").unwrap())
            .await
            .unwrap();

        assert_eq!(contributor.github.contribution_count, 3);
        assert!(contributor.email.is_none());
        assert!(contributor.shopify.is_none());
        assert_eq!(h.commerce.snapshot_fetches(), 0);
    }
}
