#![doc = include_str!(concat!("../", env!("CARGO_PKG_README")))]

pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod orchestrator;
pub mod rate_limit;
pub mod rewrite;
pub mod runner;
pub mod source;
pub mod summary;
pub mod target;
pub mod templates;

pub use archive::{ArchiveEntry, ArchiveError, ArchiveWriter, FailedRecord};
pub use classify::{ArchiveTag, RecordClassifier, SupersessionRule};
pub use config::{load_settings, ConfigError, Settings, TargetMode};
pub use error::RemoteError;
pub use identity::IdentityResolver;
pub use models::{Comment, LifecycleState, MigrationOutcome, PullRequest};
pub use orchestrator::{MigrationOrchestrator, OrchestratorOptions, RunMode};
pub use rate_limit::{RateLimitGate, RateLimitInfo, RateLimitedExecutor, RetryPolicy};
pub use rewrite::{BodyKind, BodyRewriter, MentionRewriter, PassthroughRewriter};
pub use runner::{Runner, RunnerConfig, RunnerError};
pub use source::{BitbucketAuth, BitbucketSource, SourceRepository};
pub use summary::{PipelineStep, RecordOutcome, RunReport, RunSummary};
pub use target::{DryRunTarget, GitHubTarget, IssueCloseReason, TargetRepository};
pub use templates::{generate_issue_title, TemplateError, TemplateRenderer};
