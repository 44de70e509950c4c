//! In-memory collaborators for unit tests.
//!
//! Each fake is cheap to clone and shares its state, so a test can hand one
//! copy to the code under test and inspect another afterwards.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use swag_core::{CustomerId, Email, GithubUsername, PullRequestSummary};

use crate::github::{
    GitHubApi, GitHubError, MembershipState, SearchResults, merged_pr_query, open_issues_query,
};
use crate::services::{ListMember, MailchimpError, MailingList};
use crate::shopify::{CommerceApi, CustomerSnapshot, NewCustomer, ShopifyError, UserError};

/// Organization the fakes answer searches for.
pub const ORG: &str = "gatsbyjs";

/// GitHub never returns more than this per page.
const PAGE_SIZE: u32 = 100;

/// Stored reply for a membership lookup. `GitHubError` is not `Clone`.
#[derive(Clone)]
enum MembershipReply {
    State(MembershipState),
    NotFound,
    Failure { status: u16, message: String },
}

impl MembershipReply {
    fn from_result(result: Result<MembershipState, GitHubError>) -> Self {
        match result {
            Ok(state) => Self::State(state),
            Err(GitHubError::NotFound(_)) => Self::NotFound,
            Err(GitHubError::Api { status, message }) => Self::Failure { status, message },
            Err(other) => Self::Failure {
                status: 500,
                message: other.to_string(),
            },
        }
    }

    fn to_result(&self) -> Result<MembershipState, GitHubError> {
        match self {
            Self::State(state) => Ok(*state),
            Self::NotFound => Err(GitHubError::NotFound("team membership".to_string())),
            Self::Failure { status, message } => Err(GitHubError::Api {
                status: *status,
                message: message.clone(),
            }),
        }
    }
}

struct GitHubState {
    totals: HashMap<String, u32>,
    search_failure: Option<u16>,
    membership: MembershipReply,
    invite_state: MembershipState,
    queries: Vec<String>,
    invites: usize,
}

/// Fake GitHub with per-query result counts and a scripted team membership.
///
/// Unknown searches return no results. Users start outside the team and an
/// invite leaves them pending.
#[derive(Clone)]
pub struct FakeGitHub {
    state: Arc<Mutex<GitHubState>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(GitHubState {
                totals: HashMap::new(),
                search_failure: None,
                membership: MembershipReply::NotFound,
                invite_state: MembershipState::Pending,
                queries: Vec::new(),
                invites: 0,
            })),
        }
    }

    /// `username` has `count` merged pull requests in [`ORG`].
    pub fn with_contributions(self, username: &str, count: u32) -> Self {
        let query = merged_pr_query(ORG, &GithubUsername::parse(username).unwrap());
        self.state.lock().unwrap().totals.insert(query, count);
        self
    }

    /// `count` open issues in [`ORG`] carry `label`.
    pub fn with_open_issues(self, label: &str, count: u32) -> Self {
        let query = open_issues_query(ORG, label);
        self.state.lock().unwrap().totals.insert(query, count);
        self
    }

    /// Every search fails with a 502.
    pub fn failing_search(self) -> Self {
        self.failing_search_with(502)
    }

    /// Every search fails with `status`.
    pub fn failing_search_with(self, status: u16) -> Self {
        self.state.lock().unwrap().search_failure = Some(status);
        self
    }

    /// Reply to membership lookups with `result`.
    pub fn with_membership(self, result: Result<MembershipState, GitHubError>) -> Self {
        self.state.lock().unwrap().membership = MembershipReply::from_result(result);
        self
    }

    /// State an invite puts the user in.
    pub fn with_invite_state(self, state: MembershipState) -> Self {
        self.state.lock().unwrap().invite_state = state;
        self
    }

    /// Every search query received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.state.lock().unwrap().queries.clone()
    }

    /// Number of invites sent.
    pub fn invites(&self) -> usize {
        self.state.lock().unwrap().invites
    }
}

fn pull_request(number: u32) -> PullRequestSummary {
    PullRequestSummary {
        id: u64::from(number) + 1000,
        title: format!("Change #{number}"),
        url: format!("https://github.com/{ORG}/gatsby/pull/{number}"),
        number: u64::from(number),
        labels: Vec::new(),
    }
}

impl GitHubApi for FakeGitHub {
    async fn search_issues(&self, query: &str) -> Result<SearchResults, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(query.to_string());

        if let Some(status) = state.search_failure {
            let message = if status == 422 { "Validation Failed" } else { "Bad Gateway" };
            return Err(GitHubError::Api {
                status,
                message: message.to_string(),
            });
        }

        let total_count = state.totals.get(query).copied().unwrap_or(0);
        Ok(SearchResults {
            total_count,
            items: (1..=total_count.min(PAGE_SIZE)).map(pull_request).collect(),
        })
    }

    async fn team_membership(
        &self,
        _username: &GithubUsername,
    ) -> Result<MembershipState, GitHubError> {
        self.state.lock().unwrap().membership.to_result()
    }

    async fn add_team_membership(
        &self,
        _username: &GithubUsername,
    ) -> Result<MembershipState, GitHubError> {
        let mut state = self.state.lock().unwrap();
        state.invites += 1;
        let invited = state.invite_state;
        state.membership = MembershipReply::State(invited);
        Ok(invited)
    }
}

struct StoredCustomer {
    email: String,
    snapshot: CustomerSnapshot,
}

#[derive(Default)]
struct CommerceState {
    customers: Vec<(CustomerId, StoredCustomer)>,
    next_id: u64,
    create_error: Option<String>,
    tag_error: Option<String>,
    tag_mutations: Vec<Vec<String>>,
    snapshot_fetches: usize,
}

impl CommerceState {
    fn customer_mut(&mut self, id: &CustomerId) -> Option<&mut StoredCustomer> {
        self.customers
            .iter_mut()
            .find(|(candidate, _)| candidate == id)
            .map(|(_, customer)| customer)
    }

    fn insert(&mut self, email: &str, snapshot: CustomerSnapshot) -> CustomerId {
        self.next_id += 1;
        let id = CustomerId::parse(&(7_000_000 + self.next_id).to_string()).unwrap();
        self.customers.push((
            id.clone(),
            StoredCustomer {
                email: email.to_lowercase(),
                snapshot,
            },
        ));
        id
    }
}

fn user_errors(field: Option<&str>, message: &str) -> ShopifyError {
    ShopifyError::UserErrors(vec![UserError {
        field: field.map(|f| vec![f.to_string()]),
        message: message.to_string(),
    }])
}

/// Fake Shopify that keeps customers in memory and enforces unique emails.
#[derive(Clone, Default)]
pub struct FakeCommerce {
    state: Arc<Mutex<CommerceState>>,
}

impl FakeCommerce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every customer creation fails with an `email` user error carrying
    /// `message`.
    pub fn failing_create(self, message: &str) -> Self {
        self.state.lock().unwrap().create_error = Some(message.to_string());
        self
    }

    /// Every tag mutation fails with a user error carrying `message`.
    pub fn failing_tags(self, message: &str) -> Self {
        self.state.lock().unwrap().tag_error = Some(message.to_string());
        self
    }

    /// Add an existing customer.
    pub fn seed_customer(
        &self,
        email: &str,
        tags: BTreeSet<String>,
        used_discount_codes: BTreeSet<String>,
    ) -> CustomerId {
        self.state.lock().unwrap().insert(
            email,
            CustomerSnapshot {
                tags,
                used_discount_codes,
            },
        )
    }

    pub fn customer_count(&self) -> usize {
        self.state.lock().unwrap().customers.len()
    }

    pub fn snapshot_of(&self, id: &CustomerId) -> Option<CustomerSnapshot> {
        self.state
            .lock()
            .unwrap()
            .customer_mut(id)
            .map(|customer| customer.snapshot.clone())
    }

    /// Tags sent by each successful `add_tags` call.
    pub fn tag_mutations(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().tag_mutations.clone()
    }

    pub fn snapshot_fetches(&self) -> usize {
        self.state.lock().unwrap().snapshot_fetches
    }
}

impl CommerceApi for FakeCommerce {
    async fn create_customer(&self, customer: &NewCustomer) -> Result<CustomerId, ShopifyError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = &state.create_error {
            return Err(user_errors(Some("email"), message));
        }

        let email = customer.email.normalized();
        if state.customers.iter().any(|(_, c)| c.email == email) {
            return Err(user_errors(Some("email"), "Email has already been taken"));
        }

        Ok(state.insert(
            &email,
            CustomerSnapshot {
                tags: customer.tags.iter().cloned().collect(),
                used_discount_codes: BTreeSet::new(),
            },
        ))
    }

    async fn find_customers_by_email(&self, email: &Email) -> Result<Vec<CustomerId>, ShopifyError> {
        let email = email.normalized();
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .iter()
            .filter(|(_, c)| c.email == email)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn add_tags(&self, id: &CustomerId, tags: &[String]) -> Result<(), ShopifyError> {
        let mut state = self.state.lock().unwrap();

        if let Some(message) = state.tag_error.clone() {
            return Err(user_errors(None, &message));
        }

        let customer = state
            .customer_mut(id)
            .ok_or_else(|| ShopifyError::NotFound(id.to_string()))?;
        customer.snapshot.tags.extend(tags.iter().cloned());
        state.tag_mutations.push(tags.to_vec());
        Ok(())
    }

    async fn customer_snapshot(&self, id: &CustomerId) -> Result<CustomerSnapshot, ShopifyError> {
        let mut state = self.state.lock().unwrap();
        state.snapshot_fetches += 1;
        state
            .customer_mut(id)
            .map(|customer| customer.snapshot.clone())
            .ok_or_else(|| ShopifyError::NotFound(id.to_string()))
    }
}

/// Fake mailing list that records subscriptions.
#[derive(Clone, Default)]
pub struct FakeMailingList {
    members: Arc<Mutex<Vec<ListMember>>>,
    fails: bool,
}

impl FakeMailingList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subscription is rejected.
    pub fn failing() -> Self {
        Self {
            fails: true,
            ..Self::default()
        }
    }

    pub fn members(&self) -> Vec<ListMember> {
        self.members.lock().unwrap().clone()
    }
}

impl MailingList for FakeMailingList {
    async fn subscribe(&self, member: &ListMember) -> Result<(), MailchimpError> {
        if self.fails {
            return Err(MailchimpError::Api {
                status: 400,
                message: "Member Exists".to_string(),
            });
        }
        self.members.lock().unwrap().push(member.clone());
        Ok(())
    }
}
