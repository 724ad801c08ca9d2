//! Shared pause state for all workers talking to one remote.

use super::RateLimitInfo;
use chrono::Utc;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Maximum time to pause for a rate limit reset (1 hour).
pub const MAX_WAIT: Duration = Duration::from_secs(3600);

/// Minimum remaining requests before proactively pausing.
pub const MIN_REMAINING_THRESHOLD: u32 = 5;

/// Backoff state shared by every executor of one remote.
///
/// When any worker observes a rate-limit signal, new calls from all workers
/// wait until the signaled time has passed. Calls already in flight are not
/// interrupted.
#[derive(Debug, Default)]
pub struct RateLimitGate {
    paused_until: Mutex<Option<Instant>>,
}

impl RateLimitGate {
    /// Creates an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no pause is in effect.
    pub async fn wait_for_clearance(&self) {
        loop {
            let until = *self.paused_until.lock().unwrap_or_else(PoisonError::into_inner);
            match until {
                Some(deadline) if deadline > Instant::now() => {
                    tokio::time::sleep_until(deadline).await;
                }
                _ => return,
            }
        }
    }

    /// Pauses new calls for `duration`, capped at [`MAX_WAIT`]. An existing
    /// later pause is kept.
    pub fn pause_for(&self, duration: Duration) {
        if duration > MAX_WAIT {
            warn!(
                wait_secs = duration.as_secs(),
                max_wait = MAX_WAIT.as_secs(),
                "Rate limit reset too far in future, capping wait time"
            );
        }

        let deadline = Instant::now() + duration.min(MAX_WAIT);
        let mut paused_until = self
            .paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if paused_until.is_none_or(|current| current < deadline) {
            info!(
                wait_ms = u64::try_from(duration.min(MAX_WAIT).as_millis()).unwrap_or(u64::MAX),
                "Pausing remote calls for rate limit"
            );
            *paused_until = Some(deadline);
        }
    }

    /// Pauses proactively when the remaining quota is nearly spent.
    /// Returns true if a pause was scheduled.
    pub fn observe(&self, info: &RateLimitInfo) -> bool {
        if info.remaining >= MIN_REMAINING_THRESHOLD {
            return false;
        }

        let wait = info.until_reset(Utc::now());
        if wait.is_zero() {
            return false;
        }

        info!(
            remaining = info.remaining,
            wait_secs = wait.as_secs(),
            "Rate limit low, waiting for reset"
        );
        self.pause_for(wait);
        true
    }

    /// Returns true while a pause is in effect.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some_and(|deadline| deadline > Instant::now())
    }
}
