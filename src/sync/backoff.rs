//! Exponential backoff with jitter for the authority link.

use rand::Rng;
use std::time::Duration;

/// Fraction of the base delay added as random jitter.
const JITTER_FRACTION: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
            attempt: 0,
        }
    }

    /// Delay before the next retry: `initial * 2^attempt` plus jitter,
    /// never above `max`.
    pub fn next_delay(&mut self) -> Duration {
        let factor = 1u32 << self.attempt.min(20);
        let base = self.initial.saturating_mul(factor).min(self.max);
        let jitter = base.mul_f64(rand::thread_rng().gen_range(0.0..=JITTER_FRACTION));
        self.attempt = self.attempt.saturating_add(1);
        (base + jitter).min(self.max)
    }

    /// Consecutive failures since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
