//! Error classification consumed by the retry executor.

use std::fmt::Display;
use std::time::Duration;

/// How the executor should treat a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Retry, honoring an explicit delay from the remote when present.
    Transient {
        /// Delay requested by the remote (`Retry-After`).
        retry_after: Option<Duration>,
    },
    /// Surface immediately.
    Fatal,
}

/// Errors the executor knows how to classify and wrap.
pub trait Retryable: Sized + Display {
    /// Classifies this error.
    fn retry_class(&self) -> RetryClass;

    /// Converts a transient error into the error reported once the retry
    /// budget is spent. The result must classify as [`RetryClass::Fatal`].
    fn exhausted(self, attempts: u32) -> Self;

    /// Builds the error reported when a single call exceeds its timeout.
    fn timed_out(operation: &str, limit: Duration) -> Self;
}
