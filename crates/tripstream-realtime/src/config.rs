//! Sync-subsystem configuration.

use std::time::Duration;

/// Tunables for the sync subsystem.
///
/// The backoff pair (`base_delay`, `max_delay`) is the only knob the
/// retry policy exposes; attempts are unbounded while a session is
/// active — the subsystem slows down, it never gives up.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// First retry delay; doubles per attempt.
    pub base_delay: Duration,

    /// Upper bound on the retry delay.
    pub max_delay: Duration,

    /// Silence window after which an apparently-open connection is
    /// declared stale.
    pub stale_after: Duration,

    /// Interval of the periodic staleness check.
    pub health_interval: Duration,

    /// Window within which duplicate events from multiplexed scopes
    /// collapse to one delivery.
    pub dedup_window: Duration,

    /// How long emitted user-facing notifications stay on screen.
    pub toast_duration: Duration,

    /// Capacity of the inbound change-message channel.
    pub event_buffer: usize,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            stale_after: Duration::from_secs(60),
            health_interval: Duration::from_secs(30),
            dedup_window: Duration::from_secs(5),
            toast_duration: Duration::from_secs(6),
            event_buffer: 256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = RealtimeConfig::default();
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.stale_after, Duration::from_secs(60));
        assert_eq!(config.health_interval, Duration::from_secs(30));
        assert_eq!(config.dedup_window, Duration::from_secs(5));
        assert_eq!(config.event_buffer, 256);
    }
}
