use std::time::Duration;

use rand::Rng;

use crate::error::TransportError;

/// Decides whether a failed attempt is tried again, and after how long.
///
/// `attempt` counts retries for the logical request starting at 1. Returning
/// `None` or a zero delay stops retrying and surfaces the error.
pub trait RetryStrategy: Send + Sync {
    fn decide(&self, attempt: usize, error: &TransportError) -> Option<Duration>;
}

impl<F> RetryStrategy for F
where
    F: Fn(usize, &TransportError) -> Option<Duration> + Send + Sync,
{
    fn decide(&self, attempt: usize, error: &TransportError) -> Option<Duration> {
        self(attempt, error)
    }
}

/// Retries transient failures up to a fixed count with `2^attempt` growth.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExponentialBackoff {
    retries: usize,
    base_delay: Duration,
    max_jitter: Duration,
}

impl ExponentialBackoff {
    pub fn new(retries: usize) -> Self {
        Self {
            retries,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(100),
        }
    }

    pub fn base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn max_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    pub fn retries(&self) -> usize {
        self.retries
    }

    pub(crate) fn backoff_for_retry(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(31) as u32;
        let delay = self.base_delay.saturating_mul(1_u32 << exponent);
        delay.saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis().min(u64::MAX as u128) as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RETRIES)
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn decide(&self, attempt: usize, error: &TransportError) -> Option<Duration> {
        if attempt > self.retries || !error.is_retry_allowed() {
            return None;
        }
        Some(self.backoff_for_retry(attempt))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeverRetry;

impl RetryStrategy for NeverRetry {
    fn decide(&self, _attempt: usize, _error: &TransportError) -> Option<Duration> {
        None
    }
}
