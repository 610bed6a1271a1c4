//! # Retry Policy Module
//!
//! Exponential backoff for transient failures of idempotent queue operations.
//!
//! Sends, receives and updates are never routed through this policy: repeating
//! them after an indeterminate failure can duplicate a message or hide more
//! messages than the caller asked for.

use crate::error::QueueError;
use crate::provider::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Retry policy configuration for exponential backoff
///
/// # Examples
///
/// ```rust
/// use storage_queue::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: 3 retries, 500ms initial, 8s max, 2.0x multiplier
/// let policy = RetryPolicy::default();
///
/// // Custom policy
/// let policy = RetryPolicy::new(2, Duration::from_millis(100), Duration::from_secs(1), 1.5);
/// assert_eq!(policy.total_attempts(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts
    pub max_attempts: u32,

    /// Initial delay before first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Exponential backoff multiplier (typically 2.0)
    pub backoff_multiplier: f64,

    /// Whether to add jitter to delays
    pub use_jitter: bool,

    /// Jitter range as percentage (default 25% = ±25%)
    pub jitter_percent: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            backoff_multiplier: config.backoff_multiplier,
            use_jitter: config.use_jitter,
            jitter_percent: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum retry attempts after the initial one
    /// * `initial_delay` - Initial delay before first retry
    /// * `max_delay` - Maximum delay cap
    /// * `backoff_multiplier` - Exponential growth factor (typically 1.5-2.0)
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
            use_jitter: true,
            jitter_percent: 0.25,
        }
    }

    /// Policy that never retries
    pub fn disabled() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, 1.0).without_jitter()
    }

    /// Disable jitter
    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Set custom jitter percentage (0.0 to 1.0)
    pub fn with_jitter_percent(mut self, percent: f64) -> Self {
        self.jitter_percent = percent.clamp(0.0, 1.0);
        self
    }

    /// Calculate delay for a specific retry attempt
    ///
    /// Uses exponential backoff formula: delay = initial * multiplier^attempt,
    /// capped at `max_delay`, with jitter applied if enabled.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use storage_queue::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4), 2.0)
    ///     .without_jitter();
    ///
    /// assert_eq!(policy.calculate_delay(0), Duration::from_secs(1));
    /// assert_eq!(policy.calculate_delay(1), Duration::from_secs(2));
    /// assert_eq!(policy.calculate_delay(5), Duration::from_secs(4));
    /// ```
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(attempt as i32);

        let capped_delay_secs = base_delay_secs.min(self.max_delay.as_secs_f64());

        let final_delay_secs = if self.use_jitter {
            Self::add_jitter(capped_delay_secs, self.jitter_percent)
        } else {
            capped_delay_secs
        };

        Duration::from_secs_f64(final_delay_secs)
    }

    /// Delay before retrying after `error`, honouring the error's own hint
    /// but never exceeding `max_delay`
    pub fn delay_for(&self, error: &QueueError, attempt: u32) -> Duration {
        let backoff = self.calculate_delay(attempt);
        match error.retry_after() {
            Some(hint) => backoff.max(hint.min(self.max_delay)),
            None => backoff,
        }
    }

    /// Check if we should retry for this attempt number (0-based)
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Get total number of attempts (initial + retries)
    pub fn total_attempts(&self) -> u32 {
        self.max_attempts + 1
    }

    /// Applies random variation in range [delay * (1-jitter), delay * (1+jitter)]
    fn add_jitter(delay_secs: f64, jitter_percent: f64) -> f64 {
        let jitter_range = delay_secs * jitter_percent;
        if jitter_range <= 0.0 {
            return delay_secs;
        }

        let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
        (delay_secs + jitter).max(0.0)
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
