//! Archival of closed pull requests.

use super::{flatten_comments, MigrationOrchestrator, StepFailure};
use crate::archive::ArchiveEntry;
use crate::classify::ArchiveTag;
use crate::error::RemoteError;
use crate::models::{ArchiveDisposition, ArchiveReceipt, IssueRef, LifecycleState, PullRequest};
use crate::rewrite::BodyKind;
use crate::summary::PipelineStep;
use crate::target::IssueCloseReason;
use crate::templates::generate_issue_title;
use tracing::{debug, info, warn};

impl MigrationOrchestrator {
    /// Archived, then optionally IssueFiled.
    ///
    /// Only a log write that keeps failing ends the record in `Failed`. A
    /// tracking issue that cannot be filed is logged and left for a re-run,
    /// which probes for it by title.
    pub(super) async fn archive_closed(
        &self,
        pr: &PullRequest,
        state: LifecycleState,
    ) -> Result<ArchiveReceipt, StepFailure> {
        let Some(tag) = ArchiveTag::for_state(state) else {
            return Err(StepFailure::new(
                PipelineStep::Classified,
                "Open pull request routed to archival",
                format!("classified state {state}"),
            ));
        };

        if self.is_audit() {
            return Ok(ArchiveReceipt {
                state,
                disposition: ArchiveDisposition::WouldArchive,
                issue: None,
            });
        }

        let entry = ArchiveEntry::new(pr.clone(), state);
        let appended = self
            .archive_executor
            .run("archive pull request", || self.archive.archive(entry.clone(), tag))
            .await
            .map_err(|e| {
                StepFailure::archive(PipelineStep::Archived, "Could not write archive log", &e)
            })?;

        let disposition = if appended {
            info!(tag = %tag, "Archived");
            ArchiveDisposition::Appended
        } else {
            debug!(tag = %tag, "Already archived");
            ArchiveDisposition::AlreadyArchived
        };

        let issue = if self.options.create_closed_issues {
            match self.file_tracking_issue(pr, state).await {
                Ok(issue) => Some(issue),
                Err(e) => {
                    warn!(error = %e, "Could not file tracking issue");
                    None
                }
            }
        } else {
            None
        };

        Ok(ArchiveReceipt {
            state,
            disposition,
            issue,
        })
    }

    /// IssueFiled: creates, comments and closes the tracking issue. An issue
    /// with the same title is reused and closed again, which completes one
    /// left open by an earlier run.
    async fn file_tracking_issue(
        &self,
        pr: &PullRequest,
        state: LifecycleState,
    ) -> Result<IssueRef, RemoteError> {
        let reason = match state {
            LifecycleState::Merged => IssueCloseReason::Completed,
            _ => IssueCloseReason::NotPlanned,
        };

        let title = generate_issue_title(pr);
        if let Some(existing) = self.target.find_existing_issue(&title).await? {
            debug!(number = existing.number, "Tracking issue already exists");
            self.target.close_issue(&existing, reason).await?;
            return Ok(existing);
        }

        let description = self.rewrite_body(pr, BodyKind::Description, &pr.description);
        let body = self
            .renderer
            .render_closed_issue(
                pr,
                state,
                &description,
                &self.identities.label(&pr.author),
                &self.source.pull_request_url(pr.id),
            )
            .map_err(|e| RemoteError::fatal("render tracking issue", e.to_string()))?;

        let issue = self
            .target
            .create_issue(&title, &body, &self.options.issue_labels)
            .await?;

        for entry in flatten_comments(&pr.comments) {
            let (_, body) = self
                .render_flat_comment(pr, &entry)
                .map_err(|e| RemoteError::fatal("render comment", e.to_string()))?;
            self.target.add_issue_comment(&issue, &body).await?;
        }

        self.target.close_issue(&issue, reason).await?;

        info!(number = issue.number, url = %issue.url, "Filed tracking issue");
        Ok(issue)
    }
}
