//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `DATABASE_URL` - `PostgreSQL` connection string
//! - `GITHUB_ORG` - Organization whose merged pull requests count as contributions
//! - `GITHUB_TOKEN` - Token allowed to manage the contributor team
//! - `GITHUB_TEAM_ID` - Numeric ID of the team contributors are invited to
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ACCESS_TOKEN` - Admin API access token
//!
//! ## Optional
//! - `API_HOST` - Bind address (default: 127.0.0.1)
//! - `API_PORT` - Listen port (default: 4000)
//! - `APP_ENV` - `production` (default) or `development`; development skips token validation
//! - `HTTP_TIMEOUT_SECS` - Timeout for every outbound request (default: 10)
//! - `GITHUB_API_URL` - GitHub REST base URL (default: <https://api.github.com>)
//! - `GITHUB_REQUESTS_PER_MINUTE` - Local GitHub rate limit (default: 30)
//! - `SHOPIFY_API_VERSION` - Admin API version (default: 2024-10)
//! - `SHOPIFY_ENDPOINT` - Full GraphQL endpoint, overriding store + version
//! - `DISCOUNT_TIERS` - JSON array of `{code, threshold, tag}`
//! - `MAILCHIMP_API_URI`, `MAILCHIMP_LIST_ID`, `MAILCHIMP_API_KEY` - all or none
//! - `AUTH_USERINFO_URL` - Token validation endpoint (required outside development)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use secrecy::SecretString;
use swag_core::DiscountTiers;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// API application configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Timeout applied to every outbound HTTP request
    pub http_timeout: Duration,
    /// GitHub configuration
    pub github: GitHubConfig,
    /// Shopify Admin API configuration
    pub shopify: ShopifyConfig,
    /// Mailchimp list configuration (mailing list sync is off when absent)
    pub mailchimp: Option<MailchimpConfig>,
    /// Token validation configuration
    pub auth: AuthConfig,
    /// Discount tier table
    pub discount_tiers: DiscountTiers,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// GitHub REST API configuration.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// REST base URL without trailing slash
    pub api_url: String,
    /// Organization that contributions are counted against
    pub org: String,
    /// Team contributors get invited to
    pub team_id: String,
    /// Token used for search and team membership calls
    pub token: SecretString,
    /// Local request budget
    pub requests_per_minute: NonZeroU32,
}

/// Shopify Admin API configuration.
#[derive(Debug, Clone)]
pub struct ShopifyConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Admin API version (e.g., 2024-10)
    pub api_version: String,
    /// Admin API access token
    pub access_token: SecretString,
    /// Full GraphQL endpoint, overriding `store` and `api_version`
    pub endpoint: Option<String>,
}

impl ShopifyConfig {
    /// The Admin GraphQL endpoint.
    #[must_use]
    pub fn graphql_endpoint(&self) -> String {
        self.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://{}/admin/api/{}/graphql.json",
                self.store, self.api_version
            )
        })
    }
}

/// Mailchimp list configuration.
#[derive(Debug, Clone)]
pub struct MailchimpConfig {
    /// API root, e.g. `https://us1.api.mailchimp.com/3.0`
    pub api_uri: String,
    /// Audience list ID
    pub list_id: String,
    /// API key (sent as the basic-auth password)
    pub api_key: SecretString,
}

/// Bearer token validation configuration.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    /// Endpoint that answers 200 for a valid bearer token; `None` disables validation
    pub userinfo_url: Option<String>,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = SecretString::from(env.required("DATABASE_URL")?);
        let host = env.parsed("API_HOST", "127.0.0.1")?;
        let port = env.parsed("API_PORT", "4000")?;
        let environment = match env.or_default("APP_ENV", "production").as_str() {
            "development" => Environment::Development,
            "production" => Environment::Production,
            other => {
                return Err(ConfigError::InvalidEnvVar(
                    "APP_ENV".to_string(),
                    format!("expected 'development' or 'production', got '{other}'"),
                ));
            }
        };
        let http_timeout = Duration::from_secs(env.parsed("HTTP_TIMEOUT_SECS", "10")?);

        let github = GitHubConfig {
            api_url: env
                .or_default("GITHUB_API_URL", "https://api.github.com")
                .trim_end_matches('/')
                .to_string(),
            org: env.required("GITHUB_ORG")?,
            team_id: env.required("GITHUB_TEAM_ID")?,
            token: SecretString::from(env.required("GITHUB_TOKEN")?),
            requests_per_minute: env.parsed("GITHUB_REQUESTS_PER_MINUTE", "30")?,
        };

        let shopify = ShopifyConfig {
            store: env.required("SHOPIFY_STORE")?,
            api_version: env.or_default("SHOPIFY_API_VERSION", "2024-10"),
            access_token: SecretString::from(env.required("SHOPIFY_ACCESS_TOKEN")?),
            endpoint: env.optional("SHOPIFY_ENDPOINT"),
        };

        let mailchimp = MailchimpConfig::from_env(&env)?;

        let auth = AuthConfig {
            userinfo_url: env.optional("AUTH_USERINFO_URL"),
        };
        if environment == Environment::Production && auth.userinfo_url.is_none() {
            return Err(ConfigError::MissingEnvVar("AUTH_USERINFO_URL".to_string()));
        }

        let discount_tiers = match env.optional("DISCOUNT_TIERS") {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                ConfigError::InvalidEnvVar("DISCOUNT_TIERS".to_string(), e.to_string())
            })?,
            None => DiscountTiers::default(),
        };

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            http_timeout,
            github,
            shopify,
            mailchimp,
            auth,
            discount_tiers,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether bearer tokens are validated on protected routes.
    #[must_use]
    pub const fn validates_tokens(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

impl MailchimpConfig {
    fn from_env<F>(env: &Env<F>) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_uri = env.optional("MAILCHIMP_API_URI");
        let list_id = env.optional("MAILCHIMP_LIST_ID");
        let api_key = env.optional("MAILCHIMP_API_KEY");

        match (api_uri, list_id, api_key) {
            (Some(api_uri), Some(list_id), Some(api_key)) => Ok(Some(Self {
                api_uri: api_uri.trim_end_matches('/').to_string(),
                list_id,
                api_key: SecretString::from(api_key),
            })),
            (None, None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "MAILCHIMP_*".to_string(),
                "set MAILCHIMP_API_URI, MAILCHIMP_LIST_ID and MAILCHIMP_API_KEY together".to_string(),
            )),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<F>(F);

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Get an optional variable; empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable (or its default) into `T`.
    fn parsed<T>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.or_default(key, default)
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost/swag"),
            ("GITHUB_ORG", "gatsbyjs"),
            ("GITHUB_TOKEN", "ghp_super_secret_token_value"),
            ("GITHUB_TEAM_ID", "1234"),
            ("SHOPIFY_STORE", "test.myshopify.com"),
            ("SHOPIFY_ACCESS_TOKEN", "shpat_super_secret_admin_token"),
            ("AUTH_USERINFO_URL", "https://auth.example.com/userinfo"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<ApiConfig, ConfigError> {
        ApiConfig::from_lookup(|key| vars.get(key).map(|v| (*v).to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_vars()).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:4000");
        assert_eq!(config.environment, Environment::Production);
        assert!(config.validates_tokens());
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.github.requests_per_minute.get(), 30);
        assert_eq!(
            config.shopify.graphql_endpoint(),
            "https://test.myshopify.com/admin/api/2024-10/graphql.json"
        );
        assert!(config.mailchimp.is_none());
        assert_eq!(config.discount_tiers, DiscountTiers::default());
    }

    #[test]
    fn test_missing_required_var() {
        let mut vars = base_vars();
        vars.remove("GITHUB_ORG");

        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref key) if key == "GITHUB_ORG"));
    }

    #[test]
    fn test_production_requires_userinfo_url() {
        let mut vars = base_vars();
        vars.remove("AUTH_USERINFO_URL");
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::MissingEnvVar(ref key) if key == "AUTH_USERINFO_URL"
        ));

        vars.insert("APP_ENV", "development");
        let config = load(&vars).unwrap();
        assert!(!config.validates_tokens());
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = base_vars();
        vars.insert("API_PORT", "not-a-port");
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidEnvVar(ref key, _) if key == "API_PORT"
        ));
    }

    #[test]
    fn test_partial_mailchimp_config_is_rejected() {
        let mut vars = base_vars();
        vars.insert("MAILCHIMP_API_URI", "https://us1.api.mailchimp.com/3.0");
        assert!(load(&vars).is_err());

        vars.insert("MAILCHIMP_LIST_ID", "abc123");
        vars.insert("MAILCHIMP_API_KEY", "key-us1");
        let mailchimp = load(&vars).unwrap().mailchimp.unwrap();
        assert_eq!(mailchimp.list_id, "abc123");
        assert_eq!(mailchimp.api_key.expose_secret(), "key-us1");
    }

    #[test]
    fn test_discount_tiers_from_json() {
        let mut vars = base_vars();
        vars.insert(
            "DISCOUNT_TIERS",
            r#"[{"code":"THANKS","threshold":1,"tag":"contributor"}]"#,
        );
        let config = load(&vars).unwrap();
        assert_eq!(config.discount_tiers.all().len(), 1);

        vars.insert("DISCOUNT_TIERS", r#"[{"code":"FREE","threshold":0,"tag":"x"}]"#);
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidEnvVar(ref key, _) if key == "DISCOUNT_TIERS"
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&base_vars()).unwrap();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("test.myshopify.com"));
        assert!(debug_output.contains("gatsbyjs"));
        assert!(!debug_output.contains("ghp_super_secret_token_value"));
        assert!(!debug_output.contains("shpat_super_secret_admin_token"));
    }
}
