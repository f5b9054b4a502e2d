//! Exponential backoff shared by the fetch and validation loops.

use std::time::Duration;

/// Exponential backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay before the first retry
    pub initial: Duration,
    /// Cap for exponential growth
    pub max: Duration,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self { initial: Duration::from_secs(1), max: Duration::from_secs(120), multiplier: 2.0 }
    }
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max, ..Self::default() }
    }

    /// Delay to wait after the given number of failed attempts (1-indexed).
    ///
    /// Zero failures means no delay; growth stops at `max`.
    pub fn delay_for_attempt(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }

        let exponent = (failures - 1).min(63) as i32;
        let delay_ms = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = delay_ms.min(self.max.as_millis() as f64);

        Duration::from_millis(capped_ms as u64)
    }
}
