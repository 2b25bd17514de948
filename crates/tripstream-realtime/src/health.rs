//! Silent-failure detection.
//!
//! The monitor keeps one combined last-observed timestamp across all
//! open scopes. Staleness specifically models the case where the
//! transport still claims an open connection but has gone dark: a
//! deliberately `Disconnected` session is down, not stale. The periodic
//! check runs on the controller task and never touches the network.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::status::ConnectionState;

/// Tracks event liveness across the whole subscription set.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    last_observed: Mutex<Option<Instant>>,
}

impl HealthMonitor {
    /// Creates a monitor with no observations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that an event (or heartbeat) was observed at `now`.
    ///
    /// The controller also records an observation on every transition
    /// into `Connected`, so a freshly opened but quiet connection gets a
    /// full threshold window before it can be declared stale.
    pub fn record_observation(&self, now: Instant) {
        *self.last_observed.lock() = Some(now);
    }

    /// Returns the most recent observation, if any.
    #[must_use]
    pub fn last_observed(&self) -> Option<Instant> {
        *self.last_observed.lock()
    }

    /// Returns `true` iff the connection is nominally `Connected` but
    /// nothing has been observed within `threshold`.
    #[must_use]
    pub fn is_stale(&self, now: Instant, threshold: Duration, state: ConnectionState) -> bool {
        if state != ConnectionState::Connected {
            return false;
        }
        match *self.last_observed.lock() {
            Some(last) => now.saturating_duration_since(last) > threshold,
            None => false,
        }
    }

    /// Forgets all observations (used on disconnect).
    pub fn reset(&self) {
        *self.last_observed.lock() = None;
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_past_threshold_is_stale_when_connected() {
        let monitor = HealthMonitor::new();
        let start = Instant::now();
        monitor.record_observation(start);

        let now = start + Duration::from_millis(61_000);
        assert!(monitor.is_stale(now, Duration::from_millis(60_000), ConnectionState::Connected));
    }

    #[test]
    fn silence_within_threshold_is_not_stale() {
        let monitor = HealthMonitor::new();
        let start = Instant::now();
        monitor.record_observation(start);

        let now = start + Duration::from_millis(59_000);
        assert!(!monitor.is_stale(now, Duration::from_millis(60_000), ConnectionState::Connected));
    }

    #[test]
    fn disconnected_is_never_stale() {
        let monitor = HealthMonitor::new();
        let start = Instant::now();
        monitor.record_observation(start);

        let now = start + Duration::from_secs(3600);
        let threshold = Duration::from_millis(60_000);
        assert!(!monitor.is_stale(now, threshold, ConnectionState::Disconnected));
        assert!(!monitor.is_stale(now, threshold, ConnectionState::Connecting));
        assert!(!monitor.is_stale(now, threshold, ConnectionState::Stale));
    }

    #[test]
    fn no_observation_is_not_stale() {
        let monitor = HealthMonitor::new();
        assert!(!monitor.is_stale(
            Instant::now(),
            Duration::from_secs(60),
            ConnectionState::Connected
        ));
    }

    #[test]
    fn new_observation_refreshes() {
        let monitor = HealthMonitor::new();
        let start = Instant::now();
        monitor.record_observation(start);
        monitor.record_observation(start + Duration::from_secs(50));

        let now = start + Duration::from_secs(70);
        assert!(!monitor.is_stale(now, Duration::from_secs(60), ConnectionState::Connected));
    }

    #[test]
    fn reset_forgets_observations() {
        let monitor = HealthMonitor::new();
        monitor.record_observation(Instant::now());
        monitor.reset();
        assert_eq!(monitor.last_observed(), None);
    }
}
