//! Shopify Admin API GraphQL client.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use swag_core::{CustomerId, Email};
use tracing::instrument;

use super::types::{CustomerCreateData, CustomerData, CustomersData, TagsAddData};
use super::{
    CommerceApi, CustomerSnapshot, GraphQLError, GraphQLErrorLocation, NewCustomer, ShopifyError,
    queries,
};
use crate::config::ShopifyConfig;

/// Shopify Admin API GraphQL client.
///
/// Authenticates with a static Admin API access token.
#[derive(Clone)]
pub struct AdminClient {
    inner: Arc<AdminClientInner>,
}

struct AdminClientInner {
    client: reqwest::Client,
    endpoint: String,
}

/// GraphQL response wrapper.
#[derive(Debug, Deserialize)]
struct GraphQLResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQLErrorResponse>>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorResponse {
    message: String,
    #[serde(default)]
    locations: Vec<GraphQLErrorLocationResponse>,
    #[serde(default)]
    path: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GraphQLErrorLocationResponse {
    line: i64,
    column: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomerInput<'a> {
    email: &'a str,
    first_name: &'a str,
    tags: &'a [String],
    metafields: [MetafieldInput<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    email_marketing_consent: Option<EmailMarketingConsent>,
}

#[derive(Debug, Serialize)]
struct MetafieldInput<'a> {
    namespace: &'static str,
    key: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailMarketingConsent {
    marketing_state: &'static str,
    marketing_opt_in_level: &'static str,
}

impl<'a> From<&'a NewCustomer> for CustomerInput<'a> {
    fn from(customer: &'a NewCustomer) -> Self {
        Self {
            email: customer.email.as_str(),
            first_name: &customer.first_name,
            tags: &customer.tags,
            metafields: [MetafieldInput {
                namespace: "global",
                key: "github",
                kind: "single_line_text_field",
                value: customer.github_username.as_str(),
            }],
            email_marketing_consent: customer.accepts_marketing.then_some(EmailMarketingConsent {
                marketing_state: "SUBSCRIBED",
                marketing_opt_in_level: "SINGLE_OPT_IN",
            }),
        }
    }
}

impl AdminClient {
    /// Create a new Admin API client.
    ///
    /// # Errors
    ///
    /// Returns error if the access token is not a valid header value or
    /// the HTTP client fails to build.
    pub fn new(config: &ShopifyConfig, timeout: Duration) -> Result<Self, ShopifyError> {
        let mut headers = HeaderMap::new();

        let mut token = HeaderValue::from_str(config.access_token.expose_secret())
            .map_err(|e| ShopifyError::Unauthorized(format!("Invalid access token format: {e}")))?;
        token.set_sensitive(true);
        headers.insert("X-Shopify-Access-Token", token);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(AdminClientInner {
                client,
                endpoint: config.graphql_endpoint(),
            }),
        })
    }

    /// Execute a GraphQL document.
    async fn execute<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ShopifyError> {
        let body = json!({ "query": query, "variables": variables });

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(&body)
            .send()
            .await?;

        // Check for rate limiting
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split('.').next()?.trim().parse().ok())
                .unwrap_or(2);
            return Err(ShopifyError::RateLimited(retry_after));
        }

        // Check for unauthorized
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ShopifyError::Unauthorized(
                "Invalid or expired access token".to_string(),
            ));
        }

        let graphql_response: GraphQLResponse<T> = response.json().await?;

        // Check for GraphQL errors
        if let Some(errors) = graphql_response.errors
            && !errors.is_empty()
        {
            let converted_errors: Vec<GraphQLError> = errors
                .into_iter()
                .map(|e| GraphQLError {
                    message: e.message,
                    locations: e
                        .locations
                        .into_iter()
                        .map(|l| GraphQLErrorLocation {
                            line: l.line,
                            column: l.column,
                        })
                        .collect(),
                    path: e.path,
                })
                .collect();
            return Err(ShopifyError::GraphQL(converted_errors));
        }

        graphql_response.data.ok_or_else(|| {
            ShopifyError::GraphQL(vec![GraphQLError {
                message: "No data in response".to_string(),
                locations: vec![],
                path: vec![],
            }])
        })
    }
}

fn parse_customer_id(raw: &str) -> Result<CustomerId, ShopifyError> {
    CustomerId::parse(raw).map_err(|e| ShopifyError::InvalidResponse(e.to_string()))
}

impl CommerceApi for AdminClient {
    #[instrument(skip(self, customer), fields(github_username = %customer.github_username))]
    async fn create_customer(&self, customer: &NewCustomer) -> Result<CustomerId, ShopifyError> {
        let variables = json!({ "input": CustomerInput::from(customer) });

        let data: CustomerCreateData = self.execute(queries::CUSTOMER_CREATE, variables).await?;

        let payload = data.customer_create.ok_or_else(|| {
            ShopifyError::InvalidResponse("customerCreate returned no payload".to_string())
        })?;

        if !payload.user_errors.is_empty() {
            return Err(ShopifyError::UserErrors(payload.user_errors));
        }

        let customer = payload.customer.ok_or_else(|| {
            ShopifyError::InvalidResponse("No customer returned from create".to_string())
        })?;

        parse_customer_id(&customer.id)
    }

    #[instrument(skip(self, email))]
    async fn find_customers_by_email(&self, email: &Email) -> Result<Vec<CustomerId>, ShopifyError> {
        let variables = json!({ "query": format!("email:\"{}\"", email.as_str()) });

        let data: CustomersData = self.execute(queries::CUSTOMERS_BY_EMAIL, variables).await?;

        data.customers
            .nodes
            .iter()
            .map(|node| parse_customer_id(&node.id))
            .collect()
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn add_tags(&self, id: &CustomerId, tags: &[String]) -> Result<(), ShopifyError> {
        let variables = json!({ "id": id.as_str(), "tags": tags });

        let data: TagsAddData = self.execute(queries::TAGS_ADD, variables).await?;

        let payload = data
            .tags_add
            .ok_or_else(|| ShopifyError::InvalidResponse("tagsAdd returned no payload".to_string()))?;

        if !payload.user_errors.is_empty() {
            return Err(ShopifyError::UserErrors(payload.user_errors));
        }

        Ok(())
    }

    #[instrument(skip(self), fields(customer_id = %id))]
    async fn customer_snapshot(&self, id: &CustomerId) -> Result<CustomerSnapshot, ShopifyError> {
        let variables = json!({ "id": id.as_str() });

        let data: CustomerData = self.execute(queries::CUSTOMER_SNAPSHOT, variables).await?;

        data.customer
            .map(Into::into)
            .ok_or_else(|| ShopifyError::NotFound(id.to_string()))
    }
}
