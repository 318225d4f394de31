//! Retry strategies for webhook delivery.

use std::time::Duration;

use crate::config::WebhookConfig;

/// Trait for retry strategies.
pub trait RetryStrategy: Send + Sync {
    /// Returns the delay before retrying after failed attempt `attempt`
    /// (1-based), or None if no attempts remain.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;

    /// Returns the maximum number of attempts.
    fn max_attempts(&self) -> u32;

    /// Checks if another retry should be attempted.
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts()
    }
}

/// Retry strategy driven by a fixed table of delays.
///
/// Retry `n` waits `delays[n - 1]`; the last delay is reused once the
/// table runs out. An empty table retries immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedSchedule {
    /// Delays between attempts.
    pub delays: Vec<Duration>,
    /// Maximum number of attempts.
    pub max_attempts: u32,
}

impl FixedSchedule {
    /// Creates a schedule with the given delays and three attempts.
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
            max_attempts: 3,
        }
    }

    /// Creates the schedule described by engine configuration.
    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.retry_schedule()).max_attempts(config.max_attempts)
    }

    /// Sets the maximum attempts.
    pub fn max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }
}

impl Default for FixedSchedule {
    fn default() -> Self {
        Self::new([
            Duration::from_secs(1),
            Duration::from_secs(5),
            Duration::from_secs(30),
        ])
    }
}

impl RetryStrategy for FixedSchedule {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if !self.should_retry(attempt) {
            return None;
        }

        let index = (attempt.max(1) - 1) as usize;
        let delay = self
            .delays
            .get(index)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::ZERO);
        Some(delay)
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// No retry strategy - fails after the first attempt.
#[derive(Debug, Clone, Default)]
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        None
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}
