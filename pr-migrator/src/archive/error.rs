//! Archive writer error types.

use crate::rate_limit::{RetryClass, Retryable};
use std::time::Duration;

/// Errors raised while appending to archive or failure logs.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Failed to create, open, or append to a log file.
    #[error("Failed to write '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Entry could not be encoded.
    #[error("Failed to serialize log entry: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The writer task is gone.
    #[error("Archive writer has shut down")]
    WriterClosed,

    /// The write did not complete in time.
    #[error("Archive write timed out after {secs}s")]
    TimedOut { secs: u64 },

    /// Writes kept failing until the retry budget ran out.
    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ArchiveError>,
    },
}

impl Retryable for ArchiveError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Io { .. } | Self::TimedOut { .. } => RetryClass::Transient { retry_after: None },
            _ => RetryClass::Fatal,
        }
    }

    fn exhausted(self, attempts: u32) -> Self {
        Self::RetriesExhausted {
            attempts,
            source: Box::new(self),
        }
    }

    fn timed_out(_operation: &str, limit: Duration) -> Self {
        Self::TimedOut {
            secs: limit.as_secs(),
        }
    }
}
