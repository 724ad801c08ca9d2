//! Runner error types.

use crate::archive::ArchiveError;
use crate::config::ConfigError;
use crate::error::RemoteError;

/// Errors that stop a run before any pull request is processed.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Configuration and identity mapping loading errors.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A platform could not be reached with the configured credentials.
    #[error("Cannot access {platform}: {source}")]
    Preflight {
        platform: &'static str,
        #[source]
        source: RemoteError,
    },

    /// API client initialization errors.
    #[error(transparent)]
    Client(#[from] RemoteError),

    /// The log directory could not be opened.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}
