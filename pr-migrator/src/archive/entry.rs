//! Log entry shapes.

use crate::models::{LifecycleState, PullRequest};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One line of an archive log: the full snapshot plus archival metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Snapshot of the pull request as fetched.
    #[serde(flatten)]
    pub pull_request: PullRequest,

    /// Lifecycle state the record was classified as.
    pub classified_state: LifecycleState,

    /// When the entry was written.
    pub logged_at: DateTime<Utc>,

    /// Why the pull request was archived instead of recreated.
    pub reason_not_migrated: String,
}

impl ArchiveEntry {
    /// Builds an entry stamped with the current time.
    #[must_use]
    pub fn new(pull_request: PullRequest, classified_state: LifecycleState) -> Self {
        Self {
            reason_not_migrated: format!(
                "PR is {classified_state} - Only OPEN PRs are migrated"
            ),
            pull_request,
            classified_state,
            logged_at: Utc::now(),
        }
    }
}

/// One line of the failed-record log. Never rewritten after it is appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRecord {
    /// Source pull request id.
    pub pr_id: u64,

    /// Source pull request title.
    pub title: String,

    /// Human-readable reason.
    pub reason: String,

    /// Raw error text.
    pub error_details: String,

    /// Head branch.
    pub source_branch: String,

    /// Base branch.
    pub destination_branch: String,

    /// Source author.
    pub author: String,

    /// Creation time of the source pull request.
    pub created_date: DateTime<Utc>,

    /// When the failure was recorded.
    pub failed_at: DateTime<Utc>,

    /// Pipeline step the record was in when it failed.
    pub step: String,

    /// Whether a re-run may succeed without operator action.
    pub retryable: bool,
}

impl FailedRecord {
    /// Builds a failure record for `pr`, stamped with the current time.
    #[must_use]
    pub fn new(
        pr: &PullRequest,
        step: impl Into<String>,
        reason: impl Into<String>,
        error_details: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            pr_id: pr.id,
            title: pr.title.clone(),
            reason: reason.into(),
            error_details: error_details.into(),
            source_branch: pr.source_branch.clone(),
            destination_branch: pr.destination_branch.clone(),
            author: pr.author.clone(),
            created_date: pr.created_date,
            failed_at: Utc::now(),
            step: step.into(),
            retryable,
        }
    }
}
