//! Rate limit information.

use chrono::{DateTime, Utc};
use http::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;

/// Rate limit information for a specific resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Requests remaining in the current window.
    pub remaining: u32,

    /// Unix timestamp when the rate limit resets.
    pub reset: u64,

    /// Total requests allowed per window.
    pub limit: u32,
}

impl RateLimitInfo {
    /// Reads the `X-RateLimit-*` headers. Returns `None` unless both the
    /// remaining count and the reset time are present.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let remaining = header_number(headers, "x-ratelimit-remaining")?;
        let reset = header_number(headers, "x-ratelimit-reset")?;
        let limit = header_number(headers, "x-ratelimit-limit").unwrap_or(0);

        Some(Self {
            remaining: u32::try_from(remaining).unwrap_or(u32::MAX),
            reset,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
        })
    }

    /// Time left until the window resets, relative to `now`.
    #[must_use]
    pub fn until_reset(&self, now: DateTime<Utc>) -> Duration {
        let now = u64::try_from(now.timestamp()).unwrap_or_default();
        Duration::from_secs(self.reset.saturating_sub(now))
    }
}

/// Parses a `Retry-After` header given either as delay seconds or as an
/// HTTP date.
#[must_use]
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    (at - Utc::now()).to_std().ok()
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
