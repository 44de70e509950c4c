//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ApiConfig;
use crate::db::{ContributorRepository, FeedbackRepository};
use crate::github::{GitHubClient, GitHubError};
use crate::middleware::TokenValidator;
use crate::services::{ContributorService, MailchimpClient, MailchimpError};
use crate::shopify::{AdminClient, ShopifyError};

/// The contributor service wired to the real collaborators.
pub type LiveContributorService =
    ContributorService<GitHubClient, AdminClient, ContributorRepository, MailchimpClient>;

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("GitHub client: {0}")]
    GitHub(#[from] GitHubError),
    #[error("Shopify client: {0}")]
    Shopify(#[from] ShopifyError),
    #[error("Mailchimp client: {0}")]
    Mailchimp(#[from] MailchimpError),
    #[error("token validator: {0}")]
    TokenValidator(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    pool: PgPool,
    contributors: LiveContributorService,
    feedback: FeedbackRepository,
    token_validator: TokenValidator,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - API configuration
    /// * `pool` - `PostgreSQL` connection pool
    ///
    /// # Errors
    ///
    /// Returns an error if one of the outbound HTTP clients cannot be built.
    pub fn new(config: ApiConfig, pool: PgPool) -> Result<Self, StateError> {
        let github = GitHubClient::new(&config.github, config.http_timeout)?;
        let shopify = AdminClient::new(&config.shopify, config.http_timeout)?;
        let mailchimp = config
            .mailchimp
            .as_ref()
            .map(|mailchimp| MailchimpClient::new(mailchimp, config.http_timeout))
            .transpose()?;

        if mailchimp.is_none() {
            tracing::info!("Mailchimp not configured, mailing list sync disabled");
        }

        let userinfo_url = if config.validates_tokens() {
            config.auth.userinfo_url.clone()
        } else {
            tracing::warn!("Bearer token validation disabled in development");
            None
        };
        let token_validator = TokenValidator::new(userinfo_url, config.http_timeout)?;

        let contributors = ContributorService::new(
            github,
            shopify,
            ContributorRepository::new(pool.clone()),
            mailchimp,
            config.github.org.clone(),
            config.discount_tiers.clone(),
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                feedback: FeedbackRepository::new(pool.clone()),
                config,
                pool,
                contributors,
                token_validator,
            }),
        })
    }

    /// Get a reference to the API configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the contributor service.
    #[must_use]
    pub fn contributors(&self) -> &LiveContributorService {
        &self.inner.contributors
    }

    /// Get a reference to the feedback repository.
    #[must_use]
    pub fn feedback(&self) -> &FeedbackRepository {
        &self.inner.feedback
    }

    /// Get a reference to the bearer token validator.
    #[must_use]
    pub fn token_validator(&self) -> &TokenValidator {
        &self.inner.token_validator
    }
}
