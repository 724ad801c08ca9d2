//! Run summary types and helpers.

mod result;
mod run_summary;

pub use result::{PipelineStep, RecordOutcome};
pub use run_summary::RunSummary;

/// Everything a finished run reports.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// One entry per processed pull request.
    pub records: Vec<RecordOutcome>,

    /// Aggregated counts.
    pub summary: RunSummary,

    /// Set when enumeration of the source stopped on an error.
    pub enumeration_error: Option<String>,

    /// Set when the run was stopped before the source was exhausted.
    pub cancelled: bool,
}

impl RunReport {
    /// True when every pull request of the source was enumerated and
    /// classified.
    #[must_use]
    pub fn classification_complete(&self) -> bool {
        self.enumeration_error.is_none() && !self.cancelled
    }

    /// Records that failed, for a targeted re-run.
    pub fn failures(&self) -> impl Iterator<Item = &RecordOutcome> {
        self.records.iter().filter(|record| record.is_failure())
    }
}
