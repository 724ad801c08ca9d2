//! End-to-end migration pipeline.
//!
//! Pull requests are pulled lazily from the source and handed to a bounded
//! pool of workers. Each worker runs one pass of the per-record state machine:
//!
//! ```text
//! Fetched -> Classified -> Archived -> [IssueFiled] -> Done
//!                       \-> BranchValidated -> CommitValidated -> Deduplicated
//!                           -> Created -> CommentsMigrated -> ReviewersAssigned -> Done
//! ```
//!
//! Any step before `Done` may end in `Failed`. Record-level errors never stop
//! the run; only an enumeration error stops pulling new records.

mod archival_path;
mod comments;
mod open_path;
mod reviewers;

pub use comments::{flatten_comments, FlatComment, MAX_THREAD_DEPTH};

use crate::archive::{ArchiveError, ArchiveWriter, FailedRecord};
use crate::classify::RecordClassifier;
use crate::error::RemoteError;
use crate::identity::IdentityResolver;
use crate::models::{Comment, FailureSummary, LifecycleState, MigrationOutcome, PullRequest};
use crate::rate_limit::{RateLimitGate, RateLimitedExecutor, RetryPolicy};
use crate::rewrite::{BodyRewriter, PassthroughRewriter};
use crate::source::SourceRepository;
use crate::summary::{PipelineStep, RecordOutcome, RunReport, RunSummary};
use crate::target::TargetRepository;
use crate::templates::TemplateRenderer;
use futures::stream::StreamExt;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

/// How far a run may go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunMode {
    /// Full migration.
    #[default]
    Migrate,
    /// Classification, validation and idempotency probes only. Nothing is
    /// written anywhere.
    Audit,
}

/// Per-run behavior switches.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Skip checking that commits resolve on the target.
    pub skip_commit_verification: bool,
    /// Skip (instead of fail) records whose branches are missing.
    pub skip_prs_with_missing_branches: bool,
    /// File a closed tracking issue for every archived record.
    pub create_closed_issues: bool,
    /// Labels attached to tracking issues.
    pub issue_labels: Vec<String>,
    /// Records processed in parallel.
    pub concurrency: usize,
    /// Run mode.
    pub mode: RunMode,
    /// Restricts the run to these source ids.
    pub selection: Option<BTreeSet<u64>>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            skip_commit_verification: false,
            skip_prs_with_missing_branches: false,
            create_closed_issues: false,
            issue_labels: Vec::new(),
            concurrency: 4,
            mode: RunMode::Migrate,
            selection: None,
        }
    }
}

/// Why a record stopped before `Done`.
#[derive(Debug)]
pub(crate) struct StepFailure {
    step: PipelineStep,
    reason: String,
    detail: String,
    retryable: bool,
    skipped: bool,
}

impl StepFailure {
    fn new(step: PipelineStep, reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            step,
            reason: reason.into(),
            detail: detail.into(),
            retryable: false,
            skipped: false,
        }
    }

    /// Failure caused by a remote call; retryable when the error is.
    fn remote(step: PipelineStep, reason: impl Into<String>, error: &RemoteError) -> Self {
        Self {
            retryable: error.is_retryable(),
            ..Self::new(step, reason, error.to_string())
        }
    }

    fn archive(step: PipelineStep, reason: impl Into<String>, error: &ArchiveError) -> Self {
        Self {
            retryable: true,
            ..Self::new(step, reason, error.to_string())
        }
    }

    fn skipped(step: PipelineStep, reason: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            retryable: true,
            skipped: true,
            ..Self::new(step, reason, detail)
        }
    }
}

/// Drives the migration of every source pull request.
pub struct MigrationOrchestrator {
    source: Arc<dyn SourceRepository>,
    target: Arc<dyn TargetRepository>,
    archive: ArchiveWriter,
    classifier: RecordClassifier,
    identities: IdentityResolver,
    renderer: TemplateRenderer,
    rewriter: Arc<dyn BodyRewriter>,
    archive_executor: RateLimitedExecutor,
    options: OrchestratorOptions,
}

impl MigrationOrchestrator {
    /// Creates an orchestrator with default classification, no identity
    /// mappings and untouched bodies.
    #[must_use]
    pub fn new(
        source: Arc<dyn SourceRepository>,
        target: Arc<dyn TargetRepository>,
        archive: ArchiveWriter,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            source,
            target,
            archive,
            classifier: RecordClassifier::new(),
            identities: IdentityResolver::default(),
            renderer: TemplateRenderer::new(),
            rewriter: Arc::new(PassthroughRewriter),
            archive_executor: RateLimitedExecutor::new(
                RetryPolicy::default(),
                Arc::new(RateLimitGate::new()),
            ),
            options,
        }
    }

    /// Replaces the record classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: RecordClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Replaces the identity mappings.
    #[must_use]
    pub fn with_identities(mut self, identities: IdentityResolver) -> Self {
        self.identities = identities;
        self
    }

    /// Installs a body rewrite hook.
    #[must_use]
    pub fn with_rewriter(mut self, rewriter: Arc<dyn BodyRewriter>) -> Self {
        self.rewriter = rewriter;
        self
    }

    /// Sets the retry policy of archive and failure log writes.
    #[must_use]
    pub fn with_archive_retry(mut self, policy: RetryPolicy) -> Self {
        self.archive_executor = RateLimitedExecutor::new(policy, Arc::new(RateLimitGate::new()));
        self
    }

    fn is_audit(&self) -> bool {
        self.options.mode == RunMode::Audit
    }

    /// Runs one pass over the source.
    ///
    /// Once `cancel` fires no further records are pulled; records already
    /// claimed finish their pass.
    pub async fn run(&self, cancel: CancellationToken) -> RunReport {
        let enumeration_error: Mutex<Option<RemoteError>> = Mutex::new(None);
        let concurrency = self.options.concurrency.max(1);

        info!(
            concurrency,
            audit = self.is_audit(),
            dry_run = self.target.is_rehearsal(),
            "Starting migration run"
        );

        let records: Vec<RecordOutcome> = self
            .source
            .list_pull_requests()
            .take_until(cancel.cancelled())
            .filter_map(|item| {
                let enumeration_error = &enumeration_error;
                async move {
                    match item {
                        Ok(pr) => Some(pr),
                        Err(e) => {
                            error!(error = %e, "Enumerating pull requests failed");
                            *enumeration_error
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner) = Some(e);
                            None
                        }
                    }
                }
            })
            .filter(|pr| {
                let selected = self
                    .options
                    .selection
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&pr.id));
                async move { selected }
            })
            .map(|pr| self.process(pr))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut summary = RunSummary::new(self.target.is_rehearsal(), self.is_audit());
        for record in &records {
            summary.record_result(record);
        }

        let enumeration_error = enumeration_error
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|e| e.to_string());
        let cancelled = cancel.is_cancelled();
        if cancelled {
            warn!(processed = records.len(), "Run cancelled before the source was exhausted");
        }

        RunReport {
            records,
            summary,
            enumeration_error,
            cancelled,
        }
    }

    /// One pass of the state machine for a single pull request.
    pub async fn process(&self, pr: PullRequest) -> RecordOutcome {
        let span = info_span!("pull_request", pr_id = pr.id);
        async move {
            let pr = match self.fetch_details(&pr).await {
                Ok((comments, commits)) => {
                    let mut pr = pr.with_comments(comments);
                    pr.commits = commits;
                    pr
                }
                Err(failure) => return self.fail_record(&pr, None, &failure).await,
            };

            let state = self.classifier.classify(&pr);
            info!(state = %state, source_state = %pr.state, "Classified");

            let result = if state.is_closed() {
                self.archive_closed(&pr, state)
                    .await
                    .map(MigrationOutcome::Archived)
            } else {
                self.migrate_open(&pr).await.map(MigrationOutcome::Migrated)
            };

            match result {
                Ok(outcome) => {
                    info!(outcome = outcome.label(), "Done");
                    RecordOutcome {
                        pr_id: pr.id,
                        title: pr.title,
                        state: Some(state),
                        step: PipelineStep::Done,
                        outcome,
                    }
                }
                Err(failure) => self.fail_record(&pr, Some(state), &failure).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Fetched: comments and commits are read once, so later steps never
    /// contact the source for this record again.
    async fn fetch_details(
        &self,
        pr: &PullRequest,
    ) -> Result<(Vec<Comment>, Vec<String>), StepFailure> {
        let fetch_failure = |error: RemoteError| {
            let reason = match error {
                RemoteError::NotFound { .. } => "Pull request vanished from the source",
                _ => "Could not fetch pull request details",
            };
            StepFailure::remote(PipelineStep::Fetched, reason, &error)
        };

        let comments = self
            .source
            .list_comments(pr.id)
            .await
            .map_err(fetch_failure)?;
        let commits = self
            .source
            .list_commits(pr.id)
            .await
            .map_err(fetch_failure)?;

        Ok((comments, commits))
    }

    async fn fail_record(
        &self,
        pr: &PullRequest,
        state: Option<LifecycleState>,
        failure: &StepFailure,
    ) -> RecordOutcome {
        self.log_failure(pr, failure).await;

        RecordOutcome {
            pr_id: pr.id,
            title: pr.title.clone(),
            state,
            step: failure.step,
            outcome: MigrationOutcome::Failed(FailureSummary {
                reason: failure.reason.clone(),
                retryable: failure.retryable,
                detail: failure.detail.clone(),
                skipped: failure.skipped,
            }),
        }
    }

    /// Appends the failure to the failed-record log unless it is a policy
    /// skip or the run is an audit.
    async fn log_failure(&self, pr: &PullRequest, failure: &StepFailure) {
        if failure.skipped {
            info!(step = %failure.step, reason = %failure.reason, "Pull request skipped");
            return;
        }

        warn!(
            step = %failure.step,
            reason = %failure.reason,
            detail = %failure.detail,
            retryable = failure.retryable,
            "Pull request failed"
        );

        if self.is_audit() {
            return;
        }

        let record = FailedRecord::new(
            pr,
            failure.step.as_str(),
            failure.reason.as_str(),
            failure.detail.as_str(),
            failure.retryable,
        );
        if let Err(e) = self
            .archive_executor
            .run("record failure", || self.archive.record_failure(record.clone()))
            .await
        {
            error!(error = %e, "Could not write failed record");
        }
    }
}
