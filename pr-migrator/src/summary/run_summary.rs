//! Run summary types.

use super::result::RecordOutcome;
use crate::models::{
    ArchiveDisposition, LifecycleState, MigrationDisposition, MigrationOutcome,
};

/// Summary of a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Pull requests processed.
    pub total: usize,

    /// Open pull requests.
    pub open: usize,

    /// Merged pull requests.
    pub merged: usize,

    /// Declined pull requests.
    pub declined: usize,

    /// Superseded pull requests.
    pub superseded: usize,

    /// Target pull requests created by this run.
    pub prs_created: usize,

    /// Open pull requests already present on the target.
    pub prs_already_existing: usize,

    /// Open pull requests a real run would create.
    pub prs_would_create: usize,

    /// Closed pull requests appended to the archive.
    pub archived: usize,

    /// Closed pull requests found in the archive already.
    pub already_archived: usize,

    /// Closed pull requests a real run would archive.
    pub would_archive: usize,

    /// Tracking issues filed or found for archived pull requests.
    pub issues_filed: usize,

    /// Records that failed.
    pub failed: usize,

    /// Records skipped by policy.
    pub skipped: usize,

    /// Whether target writes were rehearsed.
    pub dry_run: bool,

    /// Whether this was a read-only audit.
    pub audit: bool,
}

impl RunSummary {
    /// Creates a new empty summary.
    #[must_use]
    pub fn new(dry_run: bool, audit: bool) -> Self {
        Self {
            dry_run,
            audit,
            ..Default::default()
        }
    }

    /// Updates the summary with a record outcome.
    pub fn record_result(&mut self, result: &RecordOutcome) {
        self.total += 1;

        match result.state {
            Some(LifecycleState::Open) => self.open += 1,
            Some(LifecycleState::Merged) => self.merged += 1,
            Some(LifecycleState::Declined) => self.declined += 1,
            Some(LifecycleState::Superseded) => self.superseded += 1,
            None => {}
        }

        match &result.outcome {
            MigrationOutcome::Migrated(migrated) => match migrated.disposition {
                MigrationDisposition::Created => self.prs_created += 1,
                MigrationDisposition::AlreadyExisted => self.prs_already_existing += 1,
                MigrationDisposition::WouldCreate => self.prs_would_create += 1,
            },
            MigrationOutcome::Archived(receipt) => {
                match receipt.disposition {
                    ArchiveDisposition::Appended => self.archived += 1,
                    ArchiveDisposition::AlreadyArchived => self.already_archived += 1,
                    ArchiveDisposition::WouldArchive => self.would_archive += 1,
                }
                if receipt.issue.is_some() {
                    self.issues_filed += 1;
                }
            }
            MigrationOutcome::Failed(failure) if failure.skipped => self.skipped += 1,
            MigrationOutcome::Failed(_) => self.failed += 1,
        }
    }

    /// Returns true if any failures occurred.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Returns true if all operations were successful.
    #[must_use]
    pub fn all_success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveReceipt, FailureSummary, IssueRef, MigratedPr};
    use crate::summary::PipelineStep;

    fn record(state: Option<LifecycleState>, outcome: MigrationOutcome) -> RecordOutcome {
        RecordOutcome {
            pr_id: 1,
            title: "Title".to_string(),
            state,
            step: PipelineStep::Done,
            outcome,
        }
    }

    #[test]
    fn can_record_result() {
        let mut summary = RunSummary::new(false, false);

        summary.record_result(&record(
            Some(LifecycleState::Open),
            MigrationOutcome::Migrated(MigratedPr {
                target: None,
                disposition: MigrationDisposition::Created,
                comments_migrated: 2,
                reviewers_assigned: 1,
            }),
        ));
        summary.record_result(&record(
            Some(LifecycleState::Merged),
            MigrationOutcome::Archived(ArchiveReceipt {
                state: LifecycleState::Merged,
                disposition: ArchiveDisposition::Appended,
                issue: Some(IssueRef {
                    number: 9,
                    url: "https://github.com/acme/widgets/issues/9".to_string(),
                }),
            }),
        ));

        assert_eq!(summary.total, 2);
        assert_eq!(summary.open, 1);
        assert_eq!(summary.merged, 1);
        assert_eq!(summary.prs_created, 1);
        assert_eq!(summary.archived, 1);
        assert_eq!(summary.issues_filed, 1);
        assert!(summary.all_success());
    }

    #[test]
    fn skips_are_not_failures() {
        let mut summary = RunSummary::new(false, false);
        let failure = |skipped| {
            MigrationOutcome::Failed(FailureSummary {
                reason: "branch missing".to_string(),
                retryable: skipped,
                detail: String::new(),
                skipped,
            })
        };

        summary.record_result(&record(Some(LifecycleState::Open), failure(true)));
        assert!(!summary.has_failures());
        assert!(!summary.all_success());

        summary.record_result(&record(None, failure(false)));
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert!(summary.has_failures());
    }
}
