//! Per-record migration outcomes.

use super::LifecycleState;
use serde::Serialize;

/// Reference to a pull request on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PullRequestRef {
    /// Target pull request number.
    pub number: u64,
    /// Target pull request URL.
    pub url: String,
}

/// Reference to an issue on the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IssueRef {
    /// Target issue number.
    pub number: u64,
    /// Target issue URL.
    pub url: String,
}

/// How an open pull request reached the migrated state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationDisposition {
    /// Created during this run.
    Created,
    /// Matched an existing target pull request.
    AlreadyExisted,
    /// Rehearsal run; would have been created.
    WouldCreate,
}

/// Result of migrating an open pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedPr {
    /// Target pull request, absent when nothing was created (audit).
    pub target: Option<PullRequestRef>,
    /// How the target pull request came to be.
    pub disposition: MigrationDisposition,
    /// Comments replayed onto the target.
    pub comments_migrated: usize,
    /// Reviewers the target accepted.
    pub reviewers_assigned: usize,
}

/// How a closed pull request reached the archived state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveDisposition {
    /// Written to the archive logs during this run.
    Appended,
    /// Already present in the archive logs.
    AlreadyArchived,
    /// Audit run; would have been archived.
    WouldArchive,
}

/// Result of archiving a closed pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveReceipt {
    /// Lifecycle bucket the record was archived under.
    pub state: LifecycleState,
    /// Whether an entry was written.
    pub disposition: ArchiveDisposition,
    /// Tracking issue filed on the target, if any.
    pub issue: Option<IssueRef>,
}

/// Result of a record that could not be migrated or archived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureSummary {
    /// Human-readable reason.
    pub reason: String,
    /// Whether re-running may succeed without operator action.
    pub retryable: bool,
    /// Raw error detail.
    pub detail: String,
    /// Skipped by policy rather than failed; not written to the failure log.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
}

/// Exactly one of these is recorded per enumerated source pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MigrationOutcome {
    /// Open pull request recreated (or matched) on the target.
    Migrated(MigratedPr),
    /// Closed pull request persisted without recreation.
    Archived(ArchiveReceipt),
    /// Record failed; carries the failure.
    Failed(FailureSummary),
}

impl MigrationOutcome {
    /// Short label for logs and summaries.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Migrated(migrated) => match migrated.disposition {
                MigrationDisposition::Created => "migrated",
                MigrationDisposition::AlreadyExisted => "already migrated",
                MigrationDisposition::WouldCreate => "would migrate",
            },
            Self::Archived(receipt) => match receipt.disposition {
                ArchiveDisposition::WouldArchive => "would archive",
                _ => "archived",
            },
            Self::Failed(failure) if failure.skipped => "skipped",
            Self::Failed(_) => "failed",
        }
    }

    /// Reason of a failed or skipped record.
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Failed(failure) => Some(&failure.reason),
            _ => None,
        }
    }
}
