//! Shared retry/backoff policy.
//!
//! One policy object covers both the HTTP client's per-request retries and
//! the orchestrator's same-strategy retries on server errors.

use std::time::{Duration, SystemTime};

/// HTTP statuses worth retrying at the transport layer.
pub const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Exponential backoff with jitter, bounded by a fixed attempt count.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Whether the status code calls for a retry.
    pub fn is_retryable_status(&self, status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Delay before the given attempt (0-based): base * 2^attempt + jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(10))
            .min(self.max_delay);
        exp + jitter(Duration::ZERO, self.base_delay)
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Duration drawn from `[min, max)` using clock nanos as the entropy source.
pub fn jitter(min: Duration, max: Duration) -> Duration {
    if max <= min {
        return min;
    }
    let span = (max - min).as_millis() as u64;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    min + Duration::from_millis(nanos % span.max(1))
}
