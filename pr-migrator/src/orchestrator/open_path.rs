//! Recreation of open pull requests on the target.

use super::{flatten_comments, MigrationOrchestrator, StepFailure};
use crate::error::RemoteError;
use crate::models::{MigratedPr, MigrationDisposition, PullRequest, PullRequestRef};
use crate::rewrite::BodyKind;
use crate::summary::PipelineStep;
use bstr::ByteSlice;
use tracing::{debug, info, warn};

/// Characters of a commit hash shown in messages.
const SHORT_HASH: usize = 12;

impl MigrationOrchestrator {
    pub(super) async fn migrate_open(&self, pr: &PullRequest) -> Result<MigratedPr, StepFailure> {
        if let Some(fork) = &pr.fork {
            return Err(StepFailure::new(
                PipelineStep::Classified,
                format!("Pull request comes from fork {fork}; forks cannot be recreated"),
                format!("source branch {fork}:{}", pr.source_branch),
            ));
        }

        self.validate_branches(pr).await?;
        self.validate_commits(pr).await?;

        if let Some(existing) = self.find_existing(pr).await? {
            info!(number = existing.number, "Target pull request already exists");
            return Ok(MigratedPr {
                target: Some(existing),
                disposition: MigrationDisposition::AlreadyExisted,
                comments_migrated: 0,
                reviewers_assigned: 0,
            });
        }

        if self.is_audit() {
            return Ok(MigratedPr {
                target: None,
                disposition: MigrationDisposition::WouldCreate,
                comments_migrated: 0,
                reviewers_assigned: 0,
            });
        }

        let created = match self.create(pr).await? {
            Creation::Created(created) => created,
            Creation::Raced(existing) => {
                return Ok(MigratedPr {
                    target: Some(existing),
                    disposition: MigrationDisposition::AlreadyExisted,
                    comments_migrated: 0,
                    reviewers_assigned: 0,
                });
            }
        };

        let comments_migrated = self.migrate_comments(pr, &created).await?;
        let reviewers_assigned = self.assign_reviewers(pr, &created).await;

        let rehearsal = self.target.is_rehearsal();
        Ok(MigratedPr {
            target: (!rehearsal).then_some(created),
            disposition: if rehearsal {
                MigrationDisposition::WouldCreate
            } else {
                MigrationDisposition::Created
            },
            comments_migrated,
            reviewers_assigned,
        })
    }

    /// BranchValidated: both names are valid git references and exist on
    /// the target.
    async fn validate_branches(&self, pr: &PullRequest) -> Result<(), StepFailure> {
        let step = PipelineStep::BranchValidated;

        for branch in [&pr.source_branch, &pr.destination_branch] {
            if let Err(e) = gix_validate::reference::name_partial(branch.as_bytes().as_bstr()) {
                return Err(StepFailure::new(
                    step,
                    format!("Branch name '{branch}' is not a valid git reference"),
                    e.to_string(),
                ));
            }
        }

        let mut missing = Vec::new();
        for branch in [&pr.source_branch, &pr.destination_branch] {
            let exists = self
                .target
                .branch_exists(branch)
                .await
                .map_err(|e| StepFailure::remote(step, "Could not check branch", &e))?;
            if !exists {
                missing.push(branch.as_str());
            }
        }

        if missing.is_empty() {
            debug!("Branches exist on target");
            return Ok(());
        }

        let reason = format!("Branch(es) missing on target: {}", missing.join(", "));
        let detail = format!("head '{}', base '{}'", pr.source_branch, pr.destination_branch);
        if self.options.skip_prs_with_missing_branches {
            Err(StepFailure::skipped(step, reason, detail))
        } else {
            Err(StepFailure::new(step, reason, detail))
        }
    }

    /// CommitValidated: every commit of the pull request resolves on the
    /// target, unless verification is switched off.
    async fn validate_commits(&self, pr: &PullRequest) -> Result<(), StepFailure> {
        let step = PipelineStep::CommitValidated;

        if self.options.skip_commit_verification {
            debug!(commits = pr.commits.len(), "Commit verification skipped");
            return Ok(());
        }

        for hash in &pr.commits {
            let exists = self
                .target
                .commit_exists(hash)
                .await
                .map_err(|e| StepFailure::remote(step, "Could not check commit", &e))?;
            if exists {
                continue;
            }

            let on_source = match self.source.commit_exists(hash).await {
                Ok(true) => "it still exists on the source, so history was probably rewritten \
                             during the repository migration"
                    .to_string(),
                Ok(false) => "it no longer exists on the source either".to_string(),
                Err(e) => format!("source lookup failed: {e}"),
            };

            return Err(StepFailure::new(
                step,
                format!(
                    "Commit {} not found on target",
                    hash.get(..SHORT_HASH).unwrap_or(hash)
                ),
                format!("commit {hash} is missing on the target; {on_source}"),
            ));
        }

        Ok(())
    }

    /// Deduplicated: the idempotency probe.
    async fn find_existing(
        &self,
        pr: &PullRequest,
    ) -> Result<Option<PullRequestRef>, StepFailure> {
        self.target
            .find_existing_pull_request(&pr.source_branch, &pr.destination_branch)
            .await
            .map_err(|e| {
                StepFailure::remote(
                    PipelineStep::Deduplicated,
                    "Could not look up existing pull requests",
                    &e,
                )
            })
    }

    /// Created. A duplicate reported by the target means another process won
    /// the race; the existing pull request is used instead.
    async fn create(&self, pr: &PullRequest) -> Result<Creation, StepFailure> {
        let step = PipelineStep::Created;

        let description = self.rewrite_body(pr, BodyKind::Description, &pr.description);
        let body = self
            .renderer
            .render_pr_body(
                pr,
                &description,
                &self.identities.label(&pr.author),
                &self.source.pull_request_url(pr.id),
            )
            .map_err(|e| {
                StepFailure::new(step, "Could not render pull request body", e.to_string())
            })?;

        match self
            .target
            .create_pull_request(&pr.title, &body, &pr.source_branch, &pr.destination_branch)
            .await
        {
            Ok(created) => {
                info!(number = created.number, url = %created.url, "Created target pull request");
                Ok(Creation::Created(created))
            }
            Err(e) if e.is_already_exists() => {
                warn!("Target reported a duplicate pull request; probing again");
                match self.find_existing(pr).await? {
                    Some(existing) => Ok(Creation::Raced(existing)),
                    None => Err(StepFailure {
                        retryable: true,
                        ..StepFailure::remote(
                            step,
                            "Target reported a duplicate that could not be found",
                            &e,
                        )
                    }),
                }
            }
            Err(e) => Err(StepFailure::remote(step, create_failure_reason(&e), &e)),
        }
    }

    /// CommentsMigrated: comments are replayed in chronological order with
    /// attribution and reply context.
    async fn migrate_comments(
        &self,
        pr: &PullRequest,
        created: &PullRequestRef,
    ) -> Result<usize, StepFailure> {
        let step = PipelineStep::CommentsMigrated;
        let flat = flatten_comments(&pr.comments);

        for (index, entry) in flat.iter().enumerate() {
            let (author_label, body) = self
                .render_flat_comment(pr, entry)
                .map_err(|e| StepFailure::new(step, "Could not render comment", e.to_string()))?;

            debug!(comment_id = entry.comment.id, depth = entry.depth, "Replaying comment");
            if let Err(e) = self.target.add_comment(created, &author_label, &body).await {
                return Err(StepFailure::new(
                    step,
                    format!(
                        "Comment {} of {} could not be added to target pull request #{}",
                        index + 1,
                        flat.len(),
                        created.number
                    ),
                    format!("{e}; target pull request {} already exists", created.url),
                ));
            }
        }

        info!(count = flat.len(), "Comments migrated");
        Ok(flat.len())
    }
}

enum Creation {
    Created(PullRequestRef),
    Raced(PullRequestRef),
}

fn create_failure_reason(error: &RemoteError) -> String {
    match error {
        RemoteError::Validation { message, .. } => {
            format!("Target rejected the pull request: {message}")
        }
        RemoteError::RetriesExhausted { .. } => {
            "Target kept failing while creating the pull request".to_string()
        }
        _ => "Could not create pull request".to_string(),
    }
}
