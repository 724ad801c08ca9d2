//! Access to the platform pull requests are migrated to.

mod dry_run;
pub mod github;

pub use dry_run::DryRunTarget;
pub use github::GitHubTarget;

use crate::error::RemoteError;
use crate::models::{IssueRef, PullRequestRef};
use async_trait::async_trait;

/// Why a tracking issue is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueCloseReason {
    /// The pull request was merged.
    Completed,
    /// The pull request was declined or superseded.
    NotPlanned,
}

impl IssueCloseReason {
    /// Value of GitHub's `state_reason` field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::NotPlanned => "not_planned",
        }
    }
}

/// Create/lookup accessor over the target platform.
///
/// Creation calls are not idempotent on their own. Callers probe with
/// [`TargetRepository::find_existing_pull_request`] and
/// [`TargetRepository::find_existing_issue`] first.
#[async_trait]
pub trait TargetRepository: Send + Sync {
    /// Checks that the repository is reachable and writable.
    async fn verify_access(&self) -> Result<(), RemoteError>;

    /// Returns true when `branch` exists.
    async fn branch_exists(&self, branch: &str) -> Result<bool, RemoteError>;

    /// Returns true when commit `sha` resolves.
    async fn commit_exists(&self, sha: &str) -> Result<bool, RemoteError>;

    /// Idempotency probe: any pull request, open or closed, from `head` into `base`.
    async fn find_existing_pull_request(
        &self,
        head: &str,
        base: &str,
    ) -> Result<Option<PullRequestRef>, RemoteError>;

    /// Creates a pull request. Fails with
    /// [`ValidationKind::AlreadyExists`](crate::error::ValidationKind::AlreadyExists)
    /// when one exists for the same branch pair.
    async fn create_pull_request(
        &self,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequestRef, RemoteError>;

    /// Appends a comment to a pull request. `author_label` names the original
    /// author for logging; attribution is already part of `body`.
    async fn add_comment(
        &self,
        pr: &PullRequestRef,
        author_label: &str,
        body: &str,
    ) -> Result<(), RemoteError>;

    /// Returns true when `login` can be requested as a reviewer.
    async fn is_collaborator(&self, login: &str) -> Result<bool, RemoteError>;

    /// Requests reviews and returns the logins the target accepted.
    async fn request_reviewers(
        &self,
        pr: &PullRequestRef,
        logins: &[String],
    ) -> Result<Vec<String>, RemoteError>;

    /// Finds an issue by exact title.
    async fn find_existing_issue(&self, title: &str) -> Result<Option<IssueRef>, RemoteError>;

    /// Creates an issue.
    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<IssueRef, RemoteError>;

    /// Appends a comment to an issue.
    async fn add_issue_comment(&self, issue: &IssueRef, body: &str) -> Result<(), RemoteError>;

    /// Closes an issue.
    async fn close_issue(
        &self,
        issue: &IssueRef,
        reason: IssueCloseReason,
    ) -> Result<(), RemoteError>;

    /// True when mutating calls are replaced with logged no-ops.
    fn is_rehearsal(&self) -> bool {
        false
    }
}
