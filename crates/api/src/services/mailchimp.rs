//! Mailchimp list subscription.
//!
//! Members are upserted with `PUT /lists/{list}/members/{hash}` where the
//! hash is the MD5 of the lowercased email, so repeating a subscription is
//! harmless.
//!
//! # API Reference
//!
//! - Base URL: `MAILCHIMP_API_URI` (e.g. `https://us1.api.mailchimp.com/3.0`)
//! - Authentication: HTTP basic auth, any username, API key as password

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use swag_core::{Email, GithubUsername};
use thiserror::Error;
use tracing::instrument;

use crate::config::MailchimpConfig;

/// Errors that can occur when interacting with the Mailchimp API.
#[derive(Debug, Error)]
pub enum MailchimpError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Unauthorized (invalid API key).
    #[error("Unauthorized: invalid API key")]
    Unauthorized,
}

/// A person to add to the mailing list.
#[derive(Debug, Clone)]
pub struct ListMember {
    pub email: Email,
    pub first_name: String,
    pub github_username: GithubUsername,
}

/// A mailing list that members can be subscribed to.
pub trait MailingList: Send + Sync {
    /// Subscribe `member`, or update them if they are already on the list.
    fn subscribe(
        &self,
        member: &ListMember,
    ) -> impl Future<Output = Result<(), MailchimpError>> + Send;
}

/// Mailchimp subscriber hash: lowercase hex MD5 of the lowercased email.
#[must_use]
pub fn subscriber_hash(email: &str) -> String {
    hex::encode(Md5::digest(email.to_lowercase().as_bytes()))
}

#[derive(Debug, Serialize)]
struct MemberPayload<'a> {
    email_address: &'a str,
    email_type: &'static str,
    status_if_new: &'static str,
    merge_fields: MergeFields<'a>,
}

#[derive(Debug, Serialize)]
struct MergeFields<'a> {
    #[serde(rename = "FNAME")]
    first_name: &'a str,
    #[serde(rename = "GITHUB")]
    github: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    detail: String,
    #[serde(default)]
    title: String,
}

/// Mailchimp API client.
#[derive(Clone)]
pub struct MailchimpClient {
    inner: Arc<MailchimpClientInner>,
}

struct MailchimpClientInner {
    client: reqwest::Client,
    api_uri: String,
    list_id: String,
    api_key: SecretString,
}

impl MailchimpClient {
    /// Create a new Mailchimp API client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MailchimpConfig, timeout: Duration) -> Result<Self, MailchimpError> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(MailchimpClientInner {
                client,
                api_uri: config.api_uri.clone(),
                list_id: config.list_id.clone(),
                api_key: config.api_key.clone(),
            }),
        })
    }

    /// Parse error response from the Mailchimp API.
    async fn parse_error(response: reqwest::Response) -> MailchimpError {
        let status = response.status().as_u16();
        if status == 401 {
            return MailchimpError::Unauthorized;
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) if !body.detail.is_empty() => body.detail,
            Ok(body) => body.title,
            Err(e) => format!("Failed to parse error response: {e}"),
        };

        MailchimpError::Api { status, message }
    }
}

impl MailingList for MailchimpClient {
    #[instrument(skip(self, member), fields(username = %member.github_username))]
    async fn subscribe(&self, member: &ListMember) -> Result<(), MailchimpError> {
        let url = format!(
            "{}/lists/{}/members/{}",
            self.inner.api_uri,
            self.inner.list_id,
            subscriber_hash(member.email.as_str())
        );

        let payload = MemberPayload {
            email_address: member.email.as_str(),
            email_type: "html",
            status_if_new: "subscribed",
            merge_fields: MergeFields {
                first_name: &member.first_name,
                github: member.github_username.as_str(),
            },
        };

        let response = self
            .inner
            .client
            .put(&url)
            .basic_auth("apikey", Some(self.inner.api_key.expose_secret()))
            .json(&payload)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::info!("Mailing list member upserted");
            return Ok(());
        }

        Err(Self::parse_error(response).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_subscriber_hash_known_values() {
        assert_eq!(subscriber_hash("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(subscriber_hash(""), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn test_subscriber_hash_ignores_case() {
        assert_eq!(subscriber_hash("ABC"), subscriber_hash("abc"));
        assert_eq!(
            subscriber_hash("Team@GatsbyJS.com"),
            subscriber_hash("team@gatsbyjs.com")
        );
    }

    #[test]
    fn test_member_payload_shape() {
        let payload = MemberPayload {
            email_address: "team@gatsbyjs.com",
            email_type: "html",
            status_if_new: "subscribed",
            merge_fields: MergeFields {
                first_name: "Gatsby",
                github: "gatsbot",
            },
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["status_if_new"], "subscribed");
        assert_eq!(json["merge_fields"]["FNAME"], "Gatsby");
        assert_eq!(json["merge_fields"]["GITHUB"], "gatsbot");
    }
}
