//! Reconnect backoff policy.
//!
//! The delay schedule is a pure function of the attempt count:
//! `min(base × 2^attempt, max)` plus jitter drawn from
//! `[0, delay × 0.1]`. Keeping it pure makes the whole retry policy
//! table-testable; the controller owns the single mutable
//! [`BackoffState`].

use std::time::Duration;

/// Exponential backoff schedule with a cap and bounded jitter.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    max: Duration,
}

impl BackoffPolicy {
    /// Creates a policy from the base and maximum delay.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Returns the pre-jitter delay for an attempt (0-based).
    #[must_use]
    #[allow(clippy::cast_possible_wrap)] // attempt is clamped well below i32::MAX
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(63) as i32;
        let delay = self.base.as_secs_f64() * 2f64.powi(exponent);
        Duration::from_secs_f64(delay.min(self.max.as_secs_f64()))
    }

    /// Returns the delay for an attempt with jitter applied.
    ///
    /// Jitter is a deterministic fraction of the attempt number (the
    /// golden-ratio trick) scaled into `[0, delay × 0.1]`; deployments
    /// get spread-out retries, tests get reproducible bounds.
    #[must_use]
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let fraction = (f64::from(attempt.wrapping_add(1)) * 0.618_033_988_749_895).fract();
        delay + delay.mul_f64(0.1 * fraction)
    }
}

/// Mutable attempt counter, owned exclusively by the controller.
///
/// Reset to zero on every successful transition into `Connected`.
#[derive(Debug, Default)]
pub struct BackoffState {
    attempt: u32,
}

impl BackoffState {
    /// Returns the number of attempts consumed so far.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the attempt number to schedule next, then increments.
    pub fn advance(&mut self) -> u32 {
        let attempt = self.attempt;
        self.attempt = self.attempt.saturating_add(1);
        attempt
    }

    /// Clears the counter.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
