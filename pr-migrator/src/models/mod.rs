//! Platform-neutral pull-request records.
//!
//! Source adapters convert their wire shapes into these types; nothing outside
//! the adapters sees platform-specific fields. Records are immutable once
//! fetched.

mod comment;
mod outcome;
mod pull_request;
mod reviewer;

pub use comment::{Comment, InlineAnchor, TaskStatus};
pub use outcome::{
    ArchiveDisposition, ArchiveReceipt, FailureSummary, IssueRef, MigratedPr,
    MigrationDisposition, MigrationOutcome, PullRequestRef,
};
pub use pull_request::{ClosureMetadata, ForkOrigin, LifecycleState, PullRequest};
pub use reviewer::{ApprovalState, Reviewer};
