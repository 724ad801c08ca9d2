//! Remote call error taxonomy shared by both platform adapters.

use crate::rate_limit::{retry_after, RetryClass, Retryable};
use http::{HeaderMap, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Why the remote rejected a request as invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationKind {
    /// An object with the same identity already exists.
    AlreadyExists,
    /// A branch or commit reference does not resolve.
    InvalidReference,
    /// Any other unprocessable request.
    Other,
}

/// Errors returned by source and target repository calls.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network failure, rate limit, or server error. Retried.
    #[error("{operation} failed transiently: {message}")]
    Transient {
        operation: String,
        message: String,
        status: Option<u16>,
        retry_after: Option<Duration>,
    },

    /// The remote refused the request as invalid.
    #[error("{operation} rejected: {message}")]
    Validation {
        operation: String,
        kind: ValidationKind,
        message: String,
    },

    /// The requested resource does not exist (anymore).
    #[error("{resource} not found")]
    NotFound { resource: String },

    /// Non-retryable remote failure (authentication, permissions, bad input).
    #[error("{operation} failed: {message}")]
    Fatal {
        operation: String,
        message: String,
        status: Option<u16>,
    },

    /// A transient failure that kept recurring until the retry budget ran out.
    #[error("{source} (gave up after {attempts} attempts)")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<RemoteError>,
    },
}

impl RemoteError {
    /// Builds a transient error without status information.
    pub fn transient(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transient {
            operation: operation.into(),
            message: message.into(),
            status: None,
            retry_after: None,
        }
    }

    /// Builds a fatal error without status information.
    pub fn fatal(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fatal {
            operation: operation.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Maps an unsuccessful HTTP response onto the taxonomy.
    ///
    /// 429 and 5xx are transient, 404 means `resource` is gone, 422 is a
    /// validation failure, everything else is fatal.
    pub fn from_status(
        operation: &str,
        resource: &str,
        status: StatusCode,
        headers: &HeaderMap,
        message: Option<String>,
    ) -> Self {
        let message = message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

        match status {
            StatusCode::TOO_MANY_REQUESTS => Self::Transient {
                operation: operation.to_string(),
                message: format!("rate limited: {message}"),
                status: Some(status.as_u16()),
                retry_after: retry_after(headers),
            },
            StatusCode::NOT_FOUND => Self::NotFound {
                resource: resource.to_string(),
            },
            StatusCode::UNPROCESSABLE_ENTITY => {
                let kind = if message.to_lowercase().contains("already exists") {
                    ValidationKind::AlreadyExists
                } else {
                    ValidationKind::Other
                };
                Self::Validation {
                    operation: operation.to_string(),
                    kind,
                    message,
                }
            }
            status if status.is_server_error() => Self::Transient {
                operation: operation.to_string(),
                message: format!("{status}: {message}"),
                status: Some(status.as_u16()),
                retry_after: retry_after(headers),
            },
            status => Self::Fatal {
                operation: operation.to_string(),
                message: format!("{status}: {message}"),
                status: Some(status.as_u16()),
            },
        }
    }

    /// Returns true for a validation error reporting a duplicate object.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(
            self,
            Self::Validation {
                kind: ValidationKind::AlreadyExists,
                ..
            }
        )
    }

    /// Returns true when re-running later may succeed without operator action.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RetriesExhausted { .. })
    }

    /// HTTP status attached to the error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Fatal { status, .. } => *status,
            Self::RetriesExhausted { source, .. } => source.status(),
            Self::Validation { .. } => Some(422),
            Self::NotFound { .. } => Some(404),
        }
    }
}

impl Retryable for RemoteError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::Transient { retry_after, .. } => RetryClass::Transient {
                retry_after: *retry_after,
            },
            _ => RetryClass::Fatal,
        }
    }

    fn exhausted(self, attempts: u32) -> Self {
        Self::RetriesExhausted {
            attempts,
            source: Box::new(self),
        }
    }

    fn timed_out(operation: &str, limit: Duration) -> Self {
        Self::Transient {
            operation: operation.to_string(),
            message: format!("no response within {}s", limit.as_secs()),
            status: None,
            retry_after: None,
        }
    }
}
