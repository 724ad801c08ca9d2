//! Pull request comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Completion status of a task comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    /// Whether the task was resolved on the source.
    pub resolved: bool,
}

/// File anchor of an inline comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineAnchor {
    /// Path of the commented file.
    pub path: String,

    /// First line of the commented range.
    pub from_line: Option<u32>,

    /// Last line of the commented range.
    pub to_line: Option<u32>,
}

/// A comment (or task) on a pull request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Source-scoped identifier.
    pub id: u64,

    /// Author identity on the source platform.
    pub author: String,

    /// Opaque account id of the author, the key of in-body mentions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_account_id: Option<String>,

    /// Raw body text.
    pub body: String,

    /// Creation time.
    pub created_date: DateTime<Utc>,

    /// Last edit time, if the source reports one.
    pub updated_date: Option<DateTime<Utc>>,

    /// Comment this one replies to.
    pub parent_id: Option<u64>,

    /// Present when the comment is a task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskStatus>,

    /// Present when the comment is anchored to a file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<InlineAnchor>,
}

impl Comment {
    /// Returns true when the comment was edited after creation.
    #[must_use]
    pub fn was_edited(&self) -> bool {
        self.updated_date
            .is_some_and(|updated| updated != self.created_date)
    }
}
