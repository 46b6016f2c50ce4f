//! Retry policy for the REST snapshot fetch
//!
//! Exponential backoff with jitter. Stream reconnects use a fixed delay
//! instead (see `connection`); only the snapshot path retries with
//! backoff because a failed initial snapshot is the one fatal path.

use rand::Rng;
use std::time::Duration;

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial delay before the first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier (e.g. 2.0 for exponential)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
            jitter_factor: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `attempt` (1-based)
    ///
    /// Grows by `backoff_multiplier` per attempt up to `max_delay`. With
    /// jitter enabled the result is scaled by a random factor in
    /// `[1 - jitter_factor, 1 + jitter_factor]` so callers sharing a
    /// policy do not retry in lockstep.
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let growth = self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let mut delay_ms =
            (self.initial_delay.as_millis() as f64 * growth).min(self.max_delay.as_millis() as f64);

        if self.jitter {
            let spread = 1.0 + rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
            delay_ms *= spread;
        }

        Duration::from_millis(delay_ms.max(0.0) as u64)
    }

    /// Check whether another attempt is allowed after `attempt` failures
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
