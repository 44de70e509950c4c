//! GitHub value types: usernames, pull request summaries, issue search results.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`GithubUsername`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GithubUsernameError {
    /// The input string is empty.
    #[error("GitHub username cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("GitHub username must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character GitHub does not allow.
    #[error("GitHub username may only contain alphanumeric characters or hyphens")]
    InvalidCharacter,
    /// The input begins or ends with a hyphen.
    #[error("GitHub username cannot begin or end with a hyphen")]
    EdgeHyphen,
}

/// A GitHub login.
///
/// The value is embedded verbatim in search queries and REST paths, so only
/// the characters GitHub itself allows are accepted. A leading `@` is
/// stripped, matching how contributors usually type their handle.
///
/// ```
/// use swag_core::GithubUsername;
///
/// let user = GithubUsername::parse("@gatsbot").unwrap();
/// assert_eq!(user.as_str(), "gatsbot");
/// assert!(GithubUsername::parse("bad user").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct GithubUsername(String);

impl GithubUsername {
    /// Maximum length of a GitHub login.
    pub const MAX_LENGTH: usize = 39;

    /// Parse a `GithubUsername` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input (after trimming whitespace and one
    /// leading `@`) is empty, too long, contains anything other than ASCII
    /// alphanumerics and hyphens, or starts/ends with a hyphen.
    pub fn parse(s: &str) -> Result<Self, GithubUsernameError> {
        let s = s.trim();
        let s = s.strip_prefix('@').unwrap_or(s);

        if s.is_empty() {
            return Err(GithubUsernameError::Empty);
        }

        if s.len() > Self::MAX_LENGTH {
            return Err(GithubUsernameError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }

        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(GithubUsernameError::InvalidCharacter);
        }

        if s.starts_with('-') || s.ends_with('-') {
            return Err(GithubUsernameError::EdgeHyphen);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the username as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GithubUsername {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for GithubUsername {
    type Err = GithubUsernameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for GithubUsername {
    type Error = GithubUsernameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GithubUsername> for String {
    fn from(username: GithubUsername) -> Self {
        username.0
    }
}

impl AsRef<str> for GithubUsername {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for GithubUsername {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for GithubUsername {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

/// A label attached to an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub url: String,
}

/// Snapshot of a pull request (or issue) returned by the search API.
///
/// Fetched per query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestSummary {
    pub id: u64,
    pub title: String,
    /// Browser URL (`html_url` upstream).
    pub url: String,
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Merged pull requests authored by a user within the organization.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionSummary {
    pub total_contributions: u32,
    /// First page of results only; may be shorter than `total_contributions`.
    pub pull_requests: Vec<PullRequestSummary>,
}

impl ContributionSummary {
    /// Whether the user has at least one merged pull request.
    #[must_use]
    pub const fn is_contributor(&self) -> bool {
        self.total_contributions > 0
    }
}

/// Open issues carrying a given label.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIssues {
    pub total_issues: u32,
    pub issues: Vec<PullRequestSummary>,
}
