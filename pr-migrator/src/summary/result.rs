//! Per-record results.

use crate::models::{LifecycleState, MigrationOutcome};
use serde::Serialize;
use std::fmt;

/// Last state a pull request's pipeline reached.
///
/// Ordered: a later step compares greater than an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    Fetched,
    Classified,
    Archived,
    IssueFiled,
    BranchValidated,
    CommitValidated,
    Deduplicated,
    Created,
    CommentsMigrated,
    ReviewersAssigned,
    Done,
}

impl PipelineStep {
    /// Snake-case name used in logs and failure records.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetched => "fetched",
            Self::Classified => "classified",
            Self::Archived => "archived",
            Self::IssueFiled => "issue_filed",
            Self::BranchValidated => "branch_validated",
            Self::CommitValidated => "commit_validated",
            Self::Deduplicated => "deduplicated",
            Self::Created => "created",
            Self::CommentsMigrated => "comments_migrated",
            Self::ReviewersAssigned => "reviewers_assigned",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of processing a single source pull request.
#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    /// Source pull request id.
    pub pr_id: u64,

    /// Source title.
    pub title: String,

    /// Classified lifecycle state. `None` when the record failed before
    /// classification.
    pub state: Option<LifecycleState>,

    /// Step at which the pipeline stopped: [`PipelineStep::Done`] on success,
    /// otherwise the step that failed.
    pub step: PipelineStep,

    /// The single outcome recorded for the pull request.
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

impl RecordOutcome {
    /// Returns true if the record failed (skips excluded).
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(&self.outcome, MigrationOutcome::Failed(failure) if !failure.skipped)
    }
}
