//! Pull request snapshot.

use super::{Comment, Reviewer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Still open; recreated on the target.
    Open,
    /// Merged into its destination.
    Merged,
    /// Rejected without merging.
    Declined,
    /// Closed because another pull request replaced it.
    Superseded,
}

impl LifecycleState {
    /// Returns the upper-case label used in logs and archive entries.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
            Self::Declined => "DECLINED",
            Self::Superseded => "SUPERSEDED",
        }
    }

    /// Returns true for every state other than [`LifecycleState::Open`].
    #[must_use]
    pub fn is_closed(&self) -> bool {
        !matches!(self, Self::Open)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closure metadata reported by the source platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureMetadata {
    /// Free-text reason given when the pull request was closed.
    pub reason: Option<String>,

    /// Identity that closed the pull request.
    pub closed_by: Option<String>,
}

/// Repository a forked pull request originates from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkOrigin {
    /// Owner of the fork.
    pub owner: String,

    /// Repository name of the fork.
    pub repository: String,
}

impl fmt::Display for ForkOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repository)
    }
}

/// A pull request fetched from the source platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Source-scoped identifier.
    pub id: u64,

    /// Title.
    pub title: String,

    /// Description, round-tripped as opaque text.
    pub description: String,

    /// Author identity on the source platform.
    pub author: String,

    /// Branch the changes come from.
    pub source_branch: String,

    /// Branch the changes target.
    pub destination_branch: String,

    /// State as reported by the source.
    pub state: LifecycleState,

    /// Creation time.
    pub created_date: DateTime<Utc>,

    /// Last update time.
    pub updated_date: Option<DateTime<Utc>>,

    /// Closure time, for closed pull requests.
    pub closed_date: Option<DateTime<Utc>>,

    /// Merge commit hash, for merged pull requests.
    pub merge_commit: Option<String>,

    /// Closure metadata, when the source provides any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closure: Option<ClosureMetadata>,

    /// Fork the pull request comes from, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<ForkOrigin>,

    /// Link to the pull request on the source platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,

    /// Comments in source order.
    #[serde(default)]
    pub comments: Vec<Comment>,

    /// Reviewers and participants.
    #[serde(default)]
    pub reviewers: Vec<Reviewer>,

    /// Commit hashes, oldest first.
    #[serde(default)]
    pub commits: Vec<String>,
}

impl PullRequest {
    /// Returns a copy of this record carrying the given comments.
    #[must_use]
    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = comments;
        self
    }
}
