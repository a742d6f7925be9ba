//! Reconnect delay schedule.

use std::time::Duration;

/// Exponential backoff with a cap and a bounded number of attempts.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts,
            attempts: 0,
        }
    }

    pub fn from_config(config: &spectra_config::ClientConfig) -> Self {
        Self::new(
            Duration::from_millis(config.reconnect_delay_ms),
            Duration::from_millis(config.max_reconnect_delay_ms),
            config.reconnect_attempts,
        )
    }

    /// Delay before the next attempt, or `None` once attempts are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        let factor = 2u32.saturating_pow(self.attempts);
        self.attempts += 1;
        Some(self.base.saturating_mul(factor).min(self.max))
    }

    /// Call after a successful connect.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
