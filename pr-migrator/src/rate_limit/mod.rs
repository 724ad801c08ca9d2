//! Retry and rate-limit handling for remote calls.
//!
//! Every remote call made by the adapters goes through [`execute`], which
//! retries transient failures with exponential backoff and honors explicit
//! `Retry-After` delays. Executors for the same remote share one
//! [`RateLimitGate`], so a rate-limit signal seen by one worker pauses new
//! calls from all of them.

mod classify;
mod gate;
mod info;
mod policy;

pub use classify::{RetryClass, Retryable};
pub use gate::{RateLimitGate, MAX_WAIT, MIN_REMAINING_THRESHOLD};
pub use info::{retry_after, RateLimitInfo};
pub use policy::{no_jitter, proportional_jitter, JitterFn, RetryPolicy};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A retry policy bound to the gate of one remote.
#[derive(Debug, Clone)]
pub struct RateLimitedExecutor {
    policy: RetryPolicy,
    gate: Arc<RateLimitGate>,
}

impl RateLimitedExecutor {
    /// Creates an executor sharing `gate` with other executors of the same remote.
    #[must_use]
    pub fn new(policy: RetryPolicy, gate: Arc<RateLimitGate>) -> Self {
        Self { policy, gate }
    }

    /// Returns the retry policy.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the shared gate.
    #[must_use]
    pub fn gate(&self) -> &Arc<RateLimitGate> {
        &self.gate
    }

    /// Runs `call` under this executor's policy. See [`execute`].
    ///
    /// # Errors
    ///
    /// Returns the last error once it is fatal or the retry budget is spent.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, call: F) -> Result<T, E>
    where
        E: Retryable,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        execute(&self.policy, &self.gate, operation, call).await
    }
}

/// Runs one logical remote operation, retrying transient failures.
///
/// Attempts run strictly one after another. Before each attempt the shared
/// gate must be clear. A `Retry-After` delay replaces the computed backoff
/// and also pauses the gate for every other worker. Once `max_attempts` or
/// `max_total_wait` would be exceeded the error is wrapped with
/// [`Retryable::exhausted`].
///
/// # Errors
///
/// Returns fatal errors immediately and exhausted transient errors once the
/// budget is spent.
pub async fn execute<T, E, F, Fut>(
    policy: &RetryPolicy,
    gate: &RateLimitGate,
    operation: &str,
    mut call: F,
) -> Result<T, E>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    let mut waited = Duration::ZERO;

    loop {
        gate.wait_for_clearance().await;

        let result = match policy.call_timeout {
            Some(limit) => match tokio::time::timeout(limit, call()).await {
                Ok(result) => result,
                Err(_) => Err(E::timed_out(operation, limit)),
            },
            None => call().await,
        };

        let error = match result {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "Remote call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => error,
        };

        let RetryClass::Transient { retry_after } = error.retry_class() else {
            return Err(error);
        };

        if let Some(delay) = retry_after {
            gate.pause_for(delay);
        }

        if attempt >= max_attempts {
            warn!(operation, attempt, error = %error, "Retry attempts exhausted");
            return Err(error.exhausted(attempt));
        }

        let delay = retry_after
            .map(|delay| delay.min(MAX_WAIT))
            .unwrap_or_else(|| policy.backoff(attempt));

        if waited + delay > policy.max_total_wait {
            warn!(
                operation,
                attempt,
                waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Retry wait budget exhausted"
            );
            return Err(error.exhausted(attempt));
        }

        warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Transient failure, retrying"
        );

        tokio::time::sleep(delay).await;
        waited += delay;
        attempt += 1;
    }
}
