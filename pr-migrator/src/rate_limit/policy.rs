//! Retry policy values.

use rand::Rng;
use std::time::Duration;

/// Jitter applied to each computed backoff delay.
pub type JitterFn = fn(Duration) -> Duration;

/// Bounds and timing for retrying transient failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts per operation, including the first.
    pub max_attempts: u32,

    /// Delay before the first retry; doubled on each following retry.
    pub base_delay: Duration,

    /// Upper bound for a single computed delay.
    pub max_delay: Duration,

    /// Upper bound for the summed delays of one operation.
    pub max_total_wait: Duration,

    /// Timeout applied to each individual call.
    pub call_timeout: Option<Duration>,

    /// Jitter added on top of computed delays. Not applied to `Retry-After`.
    pub jitter: JitterFn,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_total_wait: Duration::from_secs(600),
            call_timeout: Some(Duration::from_secs(30)),
            jitter: proportional_jitter,
        }
    }
}

impl RetryPolicy {
    /// Returns a copy of the policy without jitter.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = no_jitter;
        self
    }

    /// Delay before the retry that follows attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_delay
            .saturating_mul(1 << exponent)
            .min(self.max_delay);
        (self.jitter)(delay)
    }
}

/// Adds up to a quarter of the delay at random.
#[must_use]
pub fn proportional_jitter(delay: Duration) -> Duration {
    let spread = u64::try_from(delay.as_millis() / 4).unwrap_or(u64::MAX);
    if spread == 0 {
        return delay;
    }
    delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
}

/// Leaves the delay untouched.
#[must_use]
pub fn no_jitter(delay: Duration) -> Duration {
    delay
}
