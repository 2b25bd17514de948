//! Atomic counters for monitoring the sync pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters covering the controller and decode stages.
///
/// Dispatch-stage counters live in
/// [`DispatcherMetrics`](crate::dispatcher::DispatcherMetrics).
#[derive(Debug, Default)]
pub struct RealtimeMetrics {
    /// Raw change messages received from the transport.
    pub messages_observed: AtomicU64,
    /// Messages successfully decoded into domain events.
    pub events_decoded: AtomicU64,
    /// Messages dropped because decoding failed.
    pub decode_failures: AtomicU64,
    /// Subscription-set opens attempted.
    pub open_attempts: AtomicU64,
    /// Subscription-set opens that failed.
    pub open_failures: AtomicU64,
    /// Backoff waits scheduled (open failure or staleness).
    pub reconnect_waits: AtomicU64,
    /// Times the health check declared the connection stale.
    pub stale_detections: AtomicU64,
}

impl RealtimeMetrics {
    /// Returns raw change messages received.
    #[must_use]
    pub fn messages_observed(&self) -> u64 {
        self.messages_observed.load(Ordering::Relaxed)
    }

    /// Returns messages successfully decoded.
    #[must_use]
    pub fn events_decoded(&self) -> u64 {
        self.events_decoded.load(Ordering::Relaxed)
    }

    /// Returns messages dropped by the decoder.
    #[must_use]
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }

    /// Returns subscription-set opens attempted.
    #[must_use]
    pub fn open_attempts(&self) -> u64 {
        self.open_attempts.load(Ordering::Relaxed)
    }

    /// Returns subscription-set opens that failed.
    #[must_use]
    pub fn open_failures(&self) -> u64 {
        self.open_failures.load(Ordering::Relaxed)
    }

    /// Returns backoff waits scheduled.
    #[must_use]
    pub fn reconnect_waits(&self) -> u64 {
        self.reconnect_waits.load(Ordering::Relaxed)
    }

    /// Returns staleness detections.
    #[must_use]
    pub fn stale_detections(&self) -> u64 {
        self.stale_detections.load(Ordering::Relaxed)
    }
}
