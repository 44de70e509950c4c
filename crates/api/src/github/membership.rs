//! Contributor team enrolment.

use swag_core::GithubUsername;
use thiserror::Error;
use tracing::instrument;

use super::{GitHubApi, GitHubError, MembershipState};

/// Outcome of [`invite_if_necessary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// The user already belongs to the team.
    AlreadyMember,
    /// An earlier invitation is still pending; no new invite was sent.
    AlreadyInvited,
    /// An invitation was sent.
    Invited,
}

/// The membership check or the invite failed.
///
/// Callers treat this as non-fatal.
#[derive(Debug, Error)]
#[error("Failed to invite @{username} to the contributor team: {source}")]
pub struct MembershipError {
    pub username: GithubUsername,
    #[source]
    pub source: GitHubError,
}

/// Make sure `username` has at least a pending invitation to the team.
///
/// # Errors
///
/// Returns `MembershipError` for any GitHub failure other than the
/// "not a member" 404 that triggers the invite.
#[instrument(skip(github), fields(username = %username))]
pub async fn invite_if_necessary<G: GitHubApi>(
    github: &G,
    username: &GithubUsername,
) -> Result<Membership, MembershipError> {
    let failed = |source| MembershipError {
        username: username.clone(),
        source,
    };

    match github.team_membership(username).await {
        Ok(MembershipState::Active) => {
            tracing::debug!("Already a member of the team");
            Ok(Membership::AlreadyMember)
        }
        Ok(MembershipState::Pending) => {
            tracing::debug!("Already invited to the team");
            Ok(Membership::AlreadyInvited)
        }
        Err(GitHubError::NotFound(_)) => {
            match github.add_team_membership(username).await.map_err(failed)? {
                MembershipState::Active => {
                    tracing::debug!("Invite returned an active membership");
                    Ok(Membership::AlreadyMember)
                }
                MembershipState::Pending => {
                    tracing::info!("Invited to the team");
                    Ok(Membership::Invited)
                }
            }
        }
        Err(e) => Err(failed(e)),
    }
}
