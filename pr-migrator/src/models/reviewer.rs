//! Reviewer information.

use serde::{Deserialize, Serialize};

/// Review state of a reviewer. Informational only; reproduced as text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    /// Approved the pull request.
    Approved,
    /// Requested changes.
    ChangesRequested,
    /// Did not review.
    #[default]
    NoReview,
}

impl ApprovalState {
    /// Returns a human-readable label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::ChangesRequested => "changes requested",
            Self::NoReview => "no review",
        }
    }
}

/// A reviewer assigned on the source platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    /// Source identity.
    pub identity: String,

    /// Review state.
    #[serde(default)]
    pub approval: ApprovalState,
}
