//! Read-only access to the platform pull requests are migrated from.

pub mod bitbucket;

pub use bitbucket::{BitbucketAuth, BitbucketSource};

use crate::error::RemoteError;
use crate::models::{Comment, PullRequest};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Paginated, read-only accessor over the source platform.
///
/// Enumeration is restartable from the beginning only. Enumerated records
/// carry no comments or commits; those are fetched per record through
/// [`SourceRepository::list_comments`] and [`SourceRepository::list_commits`].
#[async_trait]
pub trait SourceRepository: Send + Sync {
    /// Checks that the repository is reachable with the configured credentials.
    async fn verify_access(&self) -> Result<(), RemoteError>;

    /// Lazily enumerates every pull request, fetching further pages as the
    /// stream is polled. The stream ends after yielding an error.
    fn list_pull_requests(&self) -> BoxStream<'_, Result<PullRequest, RemoteError>>;

    /// Comments and tasks of a pull request, in source order.
    async fn list_comments(&self, pr_id: u64) -> Result<Vec<Comment>, RemoteError>;

    /// Commit hashes of a pull request, oldest first.
    async fn list_commits(&self, pr_id: u64) -> Result<Vec<String>, RemoteError>;

    /// Returns true when the commit exists on the source.
    async fn commit_exists(&self, hash: &str) -> Result<bool, RemoteError>;

    /// Web link of a pull request.
    fn pull_request_url(&self, pr_id: u64) -> String;
}
