//! Reusable retry policy for connection bootstrap
//!
//! One policy value covers every reconnect path in the gateway, so the
//! backoff math lives in exactly one place.

use std::time::Duration;

/// Exponential-backoff retry policy: delay = base × multiplier^(attempt−1)
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total connection attempts before giving up
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Backoff multiplier applied per subsequent attempt
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Backoff delay to wait after the given failed attempt (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1);
        self.base_delay
            .saturating_mul(self.multiplier.saturating_pow(exp))
    }
}
