//! Integration tests for the contributor swag backend.
//!
//! # Running Tests
//!
//! ```bash
//! # Mock-backed tests (no external services needed)
//! cargo test -p swag-integration-tests
//!
//! # Including the tests that need PostgreSQL
//! DATABASE_URL=postgres://localhost/swag_test cargo test -p swag-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `github_client` - GitHub REST client against the mock
//! - `shopify_client` - Shopify Admin GraphQL client against the mock
//! - `discount_flow` - Orchestrator and HTTP router end to end
//!
//! [`MockUpstream`] serves GitHub, Shopify, Mailchimp and the token
//! userinfo endpoint from one in-process axum server on an ephemeral port.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::Deserialize;
use serde_json::{Value, json};
use swag_api::config::ApiConfig;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Organization the mock GitHub answers for.
pub const ORG: &str = "gatsbyjs";
/// Contributor team id.
pub const TEAM_ID: &str = "4242";
/// Mailchimp audience id.
pub const LIST_ID: &str = "a1b2c3";
/// The only bearer token the mock userinfo endpoint accepts.
pub const VALID_TOKEN: &str = "valid-token";
/// Admin token the mock Shopify expects.
pub const SHOPIFY_TOKEN: &str = "shpat_test_token";

const PAGE_SIZE: u32 = 100;

/// A customer held by the mock Shopify.
#[derive(Debug, Clone)]
pub struct MockCustomer {
    pub id: String,
    pub email: String,
    pub github: Option<String>,
    pub tags: BTreeSet<String>,
    pub used_codes: Vec<String>,
}

/// Everything the mock upstreams know and every request they recorded.
#[derive(Debug, Default)]
pub struct UpstreamState {
    /// Merged pull request count per GitHub login.
    pub contributions: HashMap<String, u32>,
    /// Open issue count per label.
    pub open_issues: HashMap<String, u32>,
    /// Team membership state (`active` / `pending`) per login.
    pub memberships: HashMap<String, String>,
    /// Status every search answers with instead of results.
    pub search_failure: Option<u16>,
    /// Answer the next search with a 429 and `Retry-After: 1`.
    pub rate_limit_next_search: bool,
    pub customers: Vec<MockCustomer>,
    /// Message of a user error every `customerCreate` returns.
    pub create_error: Option<String>,
    /// Message of a user error every `tagsAdd` returns.
    pub tag_error: Option<String>,

    pub search_queries: Vec<String>,
    pub invites: Vec<String>,
    pub tag_mutations: Vec<Vec<String>>,
    /// Subscriber hash and body of each Mailchimp upsert.
    pub subscribers: Vec<(String, Value)>,
    /// `Authorization` headers seen by the GitHub mock.
    pub github_auth: Vec<String>,
}

impl UpstreamState {
    fn next_customer_id(&self) -> String {
        format!("gid://shopify/Customer/{}", 9_000_000 + self.customers.len() + 1)
    }

    /// Find a customer by email, ignoring case.
    #[must_use]
    pub fn customer_by_email(&self, email: &str) -> Option<&MockCustomer> {
        let email = email.to_lowercase();
        self.customers.iter().find(|c| c.email == email)
    }
}

type Shared = Arc<Mutex<UpstreamState>>;

/// In-process mock of every upstream the API talks to.
pub struct MockUpstream {
    base_url: String,
    state: Shared,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    /// Bind an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let state = Shared::default();

        let app = Router::new()
            .route("/github/search/issues", get(github_search))
            .route(
                "/github/teams/{team_id}/memberships/{username}",
                get(github_membership).put(github_invite),
            )
            .route("/shopify/graphql", post(shopify_graphql))
            .route(
                "/mailchimp/lists/{list_id}/members/{hash}",
                put(mailchimp_upsert),
            )
            .route("/userinfo", get(userinfo))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock upstream");
        let addr = listener.local_addr().expect("Mock upstream has no address");

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            handle,
        }
    }

    /// Lock the shared state to script answers or inspect requests.
    pub fn state(&self) -> MutexGuard<'_, UpstreamState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn github_url(&self) -> String {
        format!("{}/github", self.base_url)
    }

    #[must_use]
    pub fn shopify_endpoint(&self) -> String {
        format!("{}/shopify/graphql", self.base_url)
    }

    #[must_use]
    pub fn mailchimp_url(&self) -> String {
        format!("{}/mailchimp", self.base_url)
    }

    #[must_use]
    pub fn userinfo_url(&self) -> String {
        format!("{}/userinfo", self.base_url)
    }

    /// Production configuration pointing every upstream at this mock.
    ///
    /// The database URL points at `DATABASE_URL` when set; nothing connects
    /// to it unless a test asks.
    ///
    /// # Panics
    ///
    /// Panics if the generated configuration is rejected.
    #[must_use]
    pub fn config(&self) -> ApiConfig {
        self.config_with(&[])
    }

    /// Like [`Self::config`] with some variables replaced.
    ///
    /// # Panics
    ///
    /// Panics if the resulting configuration is rejected.
    #[must_use]
    pub fn config_with(&self, overrides: &[(&str, &str)]) -> ApiConfig {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/swag_test".to_string());

        let mut vars: HashMap<String, String> = [
            ("DATABASE_URL", database_url),
            ("APP_ENV", "production".to_string()),
            ("HTTP_TIMEOUT_SECS", "5".to_string()),
            ("GITHUB_API_URL", self.github_url()),
            ("GITHUB_ORG", ORG.to_string()),
            ("GITHUB_TEAM_ID", TEAM_ID.to_string()),
            ("GITHUB_TOKEN", "ghp_test_token".to_string()),
            ("GITHUB_REQUESTS_PER_MINUTE", "600".to_string()),
            ("SHOPIFY_STORE", "swag-test.myshopify.com".to_string()),
            ("SHOPIFY_ACCESS_TOKEN", SHOPIFY_TOKEN.to_string()),
            ("SHOPIFY_ENDPOINT", self.shopify_endpoint()),
            ("MAILCHIMP_API_URI", self.mailchimp_url()),
            ("MAILCHIMP_LIST_ID", LIST_ID.to_string()),
            ("MAILCHIMP_API_KEY", "mc_test_key".to_string()),
            ("AUTH_USERINFO_URL", self.userinfo_url()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        ApiConfig::from_lookup(|key| vars.get(key).cloned()).expect("Invalid test configuration")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn lock(state: &Shared) -> MutexGuard<'_, UpstreamState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn github_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

// =============================================================================
// GitHub
// =============================================================================

#[derive(Deserialize)]
struct SearchParams {
    q: String,
}

/// Value of `key:` in a search query, unquoting `key:"a b"`.
fn qualifier<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    let start = query.find(&format!("{key}:"))? + key.len() + 1;
    let rest = query.get(start..)?;
    if let Some(quoted) = rest.strip_prefix('"') {
        quoted.split('"').next()
    } else {
        rest.split_whitespace().next()
    }
}

async fn github_search(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> Response {
    let mut state = lock(&state);
    state.search_queries.push(params.q.clone());
    if let Some(auth) = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        state.github_auth.push(auth.to_string());
    }

    if state.rate_limit_next_search {
        state.rate_limit_next_search = false;
        let mut response = github_error(StatusCode::TOO_MANY_REQUESTS, "API rate limit exceeded");
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, header::HeaderValue::from_static("1"));
        return response;
    }

    if let Some(status) = state.search_failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
        let message = if status == StatusCode::UNPROCESSABLE_ENTITY {
            "Validation Failed"
        } else {
            "Server Error"
        };
        return github_error(status, message);
    }

    let total = if params.q.contains("type:pr") {
        qualifier(&params.q, "author")
            .and_then(|author| state.contributions.get(author))
            .copied()
    } else {
        qualifier(&params.q, "label")
            .and_then(|label| state.open_issues.get(label))
            .copied()
    }
    .unwrap_or(0);

    let items: Vec<Value> = (1..=total.min(PAGE_SIZE))
        .map(|n| {
            json!({
                "id": 10_000 + n,
                "number": n,
                "title": format!("Change #{n}"),
                "html_url": format!("https://github.com/{ORG}/gatsby/pull/{n}"),
                "url": format!("https://api.github.com/repos/{ORG}/gatsby/issues/{n}"),
                "labels": [{ "name": "type: documentation", "url": "https://api.github.com/labels/1" }],
            })
        })
        .collect();

    Json(json!({
        "total_count": total,
        "incomplete_results": false,
        "items": items,
    }))
    .into_response()
}

async fn github_membership(
    State(state): State<Shared>,
    Path((team_id, username)): Path<(String, String)>,
) -> Response {
    if team_id != TEAM_ID {
        return github_error(StatusCode::NOT_FOUND, "Not Found");
    }

    match lock(&state).memberships.get(&username) {
        Some(membership) => Json(json!({ "state": membership, "role": "member" })).into_response(),
        None => github_error(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn github_invite(
    State(state): State<Shared>,
    Path((team_id, username)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    if team_id != TEAM_ID || body["role"] != "member" {
        return github_error(StatusCode::UNPROCESSABLE_ENTITY, "Validation Failed");
    }

    let mut state = lock(&state);
    state.invites.push(username.clone());
    let membership = state
        .memberships
        .entry(username)
        .or_insert_with(|| "pending".to_string())
        .clone();

    Json(json!({ "state": membership, "role": "member" })).into_response()
}

// =============================================================================
// Shopify
// =============================================================================

#[derive(Deserialize)]
struct GraphQLRequest {
    query: String,
    #[serde(default)]
    variables: Value,
}

fn user_errors(field: Option<&str>, message: &str) -> Value {
    json!([{ "field": field.map(|f| vec![f]), "message": message }])
}

/// Plain `UserError` only has `field` and `message`; Shopify fails the whole
/// document when a mutation selects anything else from it.
fn unknown_user_error_field(query: &str) -> Option<&str> {
    let (_, rest) = query.split_once("userErrors {")?;
    let (block, _) = rest.split_once('}')?;
    block
        .split_whitespace()
        .find(|field| !matches!(*field, "field" | "message"))
}

fn strings(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

async fn shopify_graphql(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(request): Json<GraphQLRequest>,
) -> Response {
    let token = headers
        .get("X-Shopify-Access-Token")
        .and_then(|v| v.to_str().ok());
    if token != Some(SHOPIFY_TOKEN) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "errors": "[API] Invalid API key or access token" })),
        )
            .into_response();
    }

    if let Some(field) = unknown_user_error_field(&request.query) {
        let message = format!("Field '{field}' doesn't exist on type 'UserError'");
        return Json(json!({ "errors": [{ "message": message }] })).into_response();
    }

    let mut state = lock(&state);
    let vars = &request.variables;

    let data = if request.query.contains("customerCreate") {
        create_customer(&mut state, &vars["input"])
    } else if request.query.contains("tagsAdd") {
        add_tags(&mut state, vars)
    } else if request.query.contains("customers(") {
        let query = vars["query"].as_str().unwrap_or_default();
        let email = qualifier(query, "email").unwrap_or_default();
        let nodes: Vec<Value> = state
            .customer_by_email(email)
            .map(|c| json!({ "id": c.id }))
            .into_iter()
            .collect();
        json!({ "customers": { "nodes": nodes } })
    } else if request.query.contains("customer(id") {
        let id = vars["id"].as_str().unwrap_or_default();
        let customer = state.customers.iter().find(|c| c.id == id).map(|c| {
            json!({
                "tags": c.tags,
                "orders": { "nodes": [{ "discountCodes": c.used_codes }] },
            })
        });
        json!({ "customer": customer })
    } else {
        return Json(json!({ "errors": [{ "message": "Unknown operation" }] })).into_response();
    };

    Json(json!({ "data": data })).into_response()
}

fn create_customer(state: &mut UpstreamState, input: &Value) -> Value {
    if let Some(message) = &state.create_error {
        return json!({
            "customerCreate": {
                "customer": null,
                "userErrors": user_errors(Some("email"), message),
            }
        });
    }

    let email = input["email"].as_str().unwrap_or_default().to_lowercase();
    if state.customer_by_email(&email).is_some() {
        return json!({
            "customerCreate": {
                "customer": null,
                "userErrors": user_errors(Some("email"), "Email has already been taken"),
            }
        });
    }

    let id = state.next_customer_id();
    state.customers.push(MockCustomer {
        id: id.clone(),
        email,
        github: input["metafields"][0]["value"].as_str().map(str::to_string),
        tags: strings(&input["tags"]).into_iter().collect(),
        used_codes: Vec::new(),
    });

    json!({ "customerCreate": { "customer": { "id": id }, "userErrors": [] } })
}

fn add_tags(state: &mut UpstreamState, vars: &Value) -> Value {
    if let Some(message) = &state.tag_error {
        return json!({ "tagsAdd": { "node": null, "userErrors": user_errors(None, message) } });
    }

    let id = vars["id"].as_str().unwrap_or_default().to_string();
    let tags = strings(&vars["tags"]);

    let Some(customer) = state.customers.iter_mut().find(|c| c.id == id) else {
        return json!({
            "tagsAdd": { "node": null, "userErrors": user_errors(Some("id"), "Customer does not exist") }
        });
    };
    customer.tags.extend(tags.iter().cloned());
    state.tag_mutations.push(tags);

    json!({ "tagsAdd": { "node": { "id": id }, "userErrors": [] } })
}

// =============================================================================
// Mailchimp and userinfo
// =============================================================================

async fn mailchimp_upsert(
    State(state): State<Shared>,
    headers: HeaderMap,
    Path((list_id, hash)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Basic "));
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "title": "API Key Missing", "detail": "" })),
        )
            .into_response();
    }

    if list_id != LIST_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "title": "Resource Not Found", "detail": "The requested list was not found." })),
        )
            .into_response();
    }

    lock(&state).subscribers.push((hash.clone(), body));
    Json(json!({ "id": hash, "status": "subscribed" })).into_response()
}

async fn userinfo(headers: HeaderMap) -> StatusCode {
    let expected = format!("Bearer {VALID_TOKEN}");
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(auth) if auth == expected => StatusCode::OK,
        _ => StatusCode::UNAUTHORIZED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qualifier_parsing() {
        let q = r#"org:gatsbyjs label:"good first issue" type:issue is:open"#;
        assert_eq!(qualifier(q, "label"), Some("good first issue"));
        assert_eq!(qualifier(q, "org"), Some("gatsbyjs"));
        assert_eq!(
            qualifier("org:gatsbyjs author:gatsbot type:pr is:merged", "author"),
            Some("gatsbot")
        );
        assert_eq!(qualifier(r#"email:"a@b.co""#, "email"), Some("a@b.co"));
    }

    #[test]
    fn test_unknown_user_error_fields_are_rejected() {
        let with_code = "mutation { customerCreate(input: $input) { userErrors { field message code } } }";
        assert_eq!(unknown_user_error_field(with_code), Some("code"));
        assert_eq!(
            unknown_user_error_field(swag_api::shopify::queries::CUSTOMER_CREATE),
            None
        );
        assert_eq!(unknown_user_error_field("query { customers { nodes { id } } }"), None);
    }
}
