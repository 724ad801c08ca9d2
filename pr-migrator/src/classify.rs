//! Lifecycle classification of fetched pull requests.
//!
//! Classification is total and deterministic: every record lands in exactly
//! one of the four lifecycle buckets. Supersession detection is pluggable
//! because source platforms expose it through different closure metadata.

use crate::models::{LifecycleState, PullRequest};
use std::fmt;

/// Archive bucket of a closed pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveTag {
    /// Merged into its destination.
    Merged,
    /// Declined without merging.
    Declined,
    /// Replaced by another pull request.
    Superseded,
}

impl ArchiveTag {
    /// Tag for a lifecycle state, `None` for open pull requests.
    #[must_use]
    pub fn for_state(state: LifecycleState) -> Option<Self> {
        match state {
            LifecycleState::Open => None,
            LifecycleState::Merged => Some(Self::Merged),
            LifecycleState::Declined => Some(Self::Declined),
            LifecycleState::Superseded => Some(Self::Superseded),
        }
    }

    /// Lower-case tag name used for log file names.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Merged => "merged",
            Self::Declined => "declined",
            Self::Superseded => "superseded",
        }
    }

    /// Every tag, in log file order.
    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::Merged, Self::Declined, Self::Superseded]
    }
}

impl fmt::Display for ArchiveTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decides whether a closed, unmerged pull request was superseded.
pub trait SupersessionRule: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Returns true when the rule recognizes the record as superseded.
    fn is_superseded(&self, pr: &PullRequest) -> bool;
}

/// Trusts the state reported by the source.
#[derive(Debug, Default, Clone, Copy)]
pub struct SourceStateRule;

impl SupersessionRule for SourceStateRule {
    fn name(&self) -> &str {
        "source-state"
    }

    fn is_superseded(&self, pr: &PullRequest) -> bool {
        pr.state == LifecycleState::Superseded
    }
}

/// Matches configured markers against the closure reason.
#[derive(Debug, Clone)]
pub struct ClosureReasonRule {
    markers: Vec<String>,
}

impl ClosureReasonRule {
    /// Creates a rule matching any of `markers`, case-insensitively.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|marker| marker.as_ref().trim().to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }
}

impl SupersessionRule for ClosureReasonRule {
    fn name(&self) -> &str {
        "closure-reason"
    }

    fn is_superseded(&self, pr: &PullRequest) -> bool {
        let Some(reason) = pr.closure.as_ref().and_then(|c| c.reason.as_deref()) else {
            return false;
        };
        let reason = reason.to_lowercase();
        self.markers.iter().any(|marker| reason.contains(marker))
    }
}

/// Assigns every pull request a lifecycle state.
pub struct RecordClassifier {
    rules: Vec<Box<dyn SupersessionRule>>,
}

impl Default for RecordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordClassifier {
    /// Classifier using only the source-reported state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rules: vec![Box::new(SourceStateRule)],
        }
    }

    /// Classifier with the default rule plus a closure-reason rule.
    #[must_use]
    pub fn with_reason_markers(markers: &[String]) -> Self {
        let classifier = Self::new();
        if markers.is_empty() {
            classifier
        } else {
            classifier.with_rule(ClosureReasonRule::new(markers))
        }
    }

    /// Adds a supersession rule.
    #[must_use]
    pub fn with_rule(mut self, rule: impl SupersessionRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// Classifies a pull request.
    ///
    /// Open and merged records keep their state. Closed, unmerged records
    /// become superseded when any rule matches and declined otherwise.
    #[must_use]
    pub fn classify(&self, pr: &PullRequest) -> LifecycleState {
        match pr.state {
            LifecycleState::Open => LifecycleState::Open,
            LifecycleState::Merged => LifecycleState::Merged,
            LifecycleState::Declined | LifecycleState::Superseded => {
                if self.rules.iter().any(|rule| rule.is_superseded(pr)) {
                    LifecycleState::Superseded
                } else {
                    LifecycleState::Declined
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ClosureMetadata;
    use chrono::Utc;

    fn pr(state: LifecycleState, reason: Option<&str>) -> PullRequest {
        PullRequest {
            id: 1,
            title: "Test".to_string(),
            description: String::new(),
            author: "alice".to_string(),
            source_branch: "feature".to_string(),
            destination_branch: "main".to_string(),
            state,
            created_date: Utc::now(),
            updated_date: None,
            closed_date: None,
            merge_commit: None,
            closure: reason.map(|reason| ClosureMetadata {
                reason: Some(reason.to_string()),
                closed_by: None,
            }),
            fork: None,
            web_url: None,
            comments: Vec::new(),
            reviewers: Vec::new(),
            commits: Vec::new(),
        }
    }

    #[test]
    fn states_map_to_themselves_by_default() {
        let classifier = RecordClassifier::new();

        for state in [
            LifecycleState::Open,
            LifecycleState::Merged,
            LifecycleState::Declined,
            LifecycleState::Superseded,
        ] {
            assert_eq!(classifier.classify(&pr(state, None)), state);
        }
    }

    #[test]
    fn reason_marker_reclassifies_declined() {
        let classifier = RecordClassifier::with_reason_markers(&["Superseded by".to_string()]);

        let declined = pr(LifecycleState::Declined, Some("superseded by #42"));
        assert_eq!(classifier.classify(&declined), LifecycleState::Superseded);

        let plain = pr(LifecycleState::Declined, Some("not needed"));
        assert_eq!(classifier.classify(&plain), LifecycleState::Declined);
    }

    #[test]
    fn rules_never_touch_open_or_merged() {
        let classifier = RecordClassifier::with_reason_markers(&["replaced".to_string()]);

        let merged = pr(LifecycleState::Merged, Some("replaced"));
        assert_eq!(classifier.classify(&merged), LifecycleState::Merged);

        let open = pr(LifecycleState::Open, Some("replaced"));
        assert_eq!(classifier.classify(&open), LifecycleState::Open);
    }

    #[test]
    fn archive_tags_follow_state() {
        assert_eq!(ArchiveTag::for_state(LifecycleState::Open), None);
        assert_eq!(
            ArchiveTag::for_state(LifecycleState::Superseded),
            Some(ArchiveTag::Superseded)
        );
        assert_eq!(ArchiveTag::Merged.to_string(), "merged");
    }
}
