//! One-off import of contributor records from the legacy GraphQL service.
//!
//! Each record is upserted by GitHub username. Records that fail to parse
//! or to store are logged and skipped; the import keeps going.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use swag_api::db::{self, ContributorRepository, ContributorStore};
use swag_api::models::NewContributor;
use swag_core::{CustomerId, Email, GithubUsername};
use tracing::{info, warn};

const CONTRIBUTORS_QUERY: &str = "{ contributors { email githubUsername shopifyCustomerID } }";

/// Errors that abort the import as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Legacy service returned errors: {0}")]
    GraphQL(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Counts reported at the end of an import.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
struct LegacyResponse {
    data: Option<LegacyData>,
    #[serde(default)]
    errors: Vec<LegacyError>,
}

#[derive(Debug, Deserialize)]
struct LegacyData {
    #[serde(default)]
    contributors: Vec<LegacyContributor>,
}

#[derive(Debug, Deserialize)]
struct LegacyError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyContributor {
    email: Option<String>,
    github_username: Option<String>,
    #[serde(rename = "shopifyCustomerID")]
    shopify_customer_id: Option<String>,
}

impl TryFrom<LegacyContributor> for NewContributor {
    type Error = String;

    fn try_from(legacy: LegacyContributor) -> Result<Self, Self::Error> {
        let github_username = legacy
            .github_username
            .as_deref()
            .ok_or_else(|| "missing githubUsername".to_string())
            .and_then(|raw| GithubUsername::parse(raw).map_err(|e| e.to_string()))?;

        let email = legacy
            .email
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(Email::parse)
            .transpose()
            .map_err(|e| format!("@{github_username}: {e}"))?;

        let shopify_customer_id = legacy
            .shopify_customer_id
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .map(CustomerId::parse)
            .transpose()
            .map_err(|e| format!("@{github_username}: {e}"))?;

        Ok(Self {
            github_username,
            email,
            shopify_customer_id,
        })
    }
}

async fn fetch(
    source_url: &str,
    token: &SecretString,
) -> Result<Vec<LegacyContributor>, ImportError> {
    let response: LegacyResponse = reqwest::Client::builder()
        .user_agent(swag_api::USER_AGENT)
        .timeout(std::time::Duration::from_secs(60))
        .build()?
        .post(source_url)
        .bearer_auth(token.expose_secret())
        .json(&json!({ "query": CONTRIBUTORS_QUERY }))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    if !response.errors.is_empty() {
        let messages: Vec<_> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(ImportError::GraphQL(messages.join("; ")));
    }

    Ok(response.data.map(|d| d.contributors).unwrap_or_default())
}

/// Fetch every legacy record and upsert it into `DATABASE_URL`.
///
/// # Errors
///
/// Returns an error if the variable is missing, the legacy service cannot be
/// queried or the database is unreachable. Per-record failures are skipped.
pub async fn contributors(
    source_url: &str,
    token: &SecretString,
) -> Result<ImportReport, ImportError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map(SecretString::from)
        .map_err(|_| ImportError::MissingEnvVar("DATABASE_URL"))?;

    info!(source = %source_url, "Fetching legacy contributors");
    let legacy = fetch(source_url, token).await?;
    info!(count = legacy.len(), "Fetched legacy contributors");

    let pool = db::create_pool(&database_url).await?;
    let repository = ContributorRepository::new(pool);

    let mut report = ImportReport::default();
    for record in legacy {
        let contributor = match NewContributor::try_from(record) {
            Ok(contributor) => contributor,
            Err(reason) => {
                warn!(%reason, "Skipping invalid record");
                report.skipped += 1;
                continue;
            }
        };

        match repository.upsert(&contributor).await {
            Ok(_) => report.imported += 1,
            Err(e) => {
                warn!(username = %contributor.github_username, error = %e, "Skipping record");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}
