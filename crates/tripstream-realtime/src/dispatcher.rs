//! Event dispatch — routing decoded events to application callbacks.
//!
//! The dispatcher is a read-only consumer at the end of the pipeline:
//!
//! 1. **Dedup** — multiplexed scopes (an admin scope and a personal
//!    scope both matching the same row) can deliver the same change
//!    twice in quick succession; a bounded seen-set keyed by
//!    `(kind, row id, commit second)` collapses those to one delivery.
//! 2. **Route** — each event fans out to the callbacks registered for
//!    its kind, synchronously on the controller task, so arrival order
//!    is preserved per callback.
//! 3. **Notify** — booking creations and updates additionally emit a
//!    user-facing notification through the sink.
//!
//! A callback that panics is caught, logged, and counted; it never
//! stops the remaining callbacks or subsequent events.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fxhash::FxHashMap;
use parking_lot::{Mutex, RwLock};
use tripstream_core::{DomainEvent, EventKind};

use crate::config::RealtimeConfig;
use crate::notify::{booking_summary, NotificationSink, Severity};
use crate::status::ConnectionState;

type EventHandler = Box<dyn Fn(&DomainEvent) + Send + Sync>;
type StateHandler = Box<dyn Fn(ConnectionState) + Send + Sync>;

// ---------------------------------------------------------------------------
// DispatcherMetrics
// ---------------------------------------------------------------------------

/// Atomic counters for monitoring the dispatch stage.
#[derive(Debug, Default)]
pub struct DispatcherMetrics {
    /// Events delivered to at least the dedup stage.
    pub events_received: AtomicU64,
    /// Events fanned out to callbacks.
    pub events_dispatched: AtomicU64,
    /// Events collapsed by the dedup window.
    pub events_deduped: AtomicU64,
    /// Callback invocations that panicked.
    pub callback_failures: AtomicU64,
    /// User-facing notifications emitted.
    pub notifications_emitted: AtomicU64,
}

impl DispatcherMetrics {
    /// Returns events received.
    #[must_use]
    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    /// Returns events fanned out to callbacks.
    #[must_use]
    pub fn events_dispatched(&self) -> u64 {
        self.events_dispatched.load(Ordering::Relaxed)
    }

    /// Returns events collapsed by dedup.
    #[must_use]
    pub fn events_deduped(&self) -> u64 {
        self.events_deduped.load(Ordering::Relaxed)
    }

    /// Returns callback panics caught.
    #[must_use]
    pub fn callback_failures(&self) -> u64 {
        self.callback_failures.load(Ordering::Relaxed)
    }

    /// Returns notifications emitted.
    #[must_use]
    pub fn notifications_emitted(&self) -> u64 {
        self.notifications_emitted.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// DedupWindow
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DedupKey {
    kind: EventKind,
    row_id: String,
    observed_secs: i64,
}

impl DedupKey {
    fn of(event: &DomainEvent) -> Self {
        Self {
            kind: event.kind(),
            row_id: event.row_id().to_string(),
            observed_secs: event.observed_at_secs(),
        }
    }
}

/// Bounded seen-set for duplicate collapse.
#[derive(Debug)]
struct DedupWindow {
    window: Duration,
    seen: FxHashMap<DedupKey, Instant>,
}

impl DedupWindow {
    fn new(window: Duration) -> Self {
        Self {
            window,
            seen: FxHashMap::default(),
        }
    }

    /// Records a sighting. Returns `true` if this is the first sighting
    /// of the key within the window.
    fn observe(&mut self, key: DedupKey, now: Instant) -> bool {
        self.seen
            .retain(|_, seen_at| now.saturating_duration_since(*seen_at) <= self.window);
        match self.seen.get(&key) {
            Some(_) => false,
            None => {
                self.seen.insert(key, now);
                true
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.seen.len()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes decoded events to registered callbacks and the notification
/// sink.
///
/// Registration happens at application wiring time; dispatch happens on
/// the controller task. Callbacks must not register further callbacks
/// from within a delivery.
pub struct Dispatcher {
    handlers: RwLock<FxHashMap<EventKind, Vec<EventHandler>>>,
    state_handlers: RwLock<Vec<StateHandler>>,
    sink: Arc<dyn NotificationSink>,
    dedup: Mutex<DedupWindow>,
    toast_duration: Duration,
    metrics: Arc<DispatcherMetrics>,
}

impl Dispatcher {
    /// Creates a dispatcher emitting through the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>, config: &RealtimeConfig) -> Self {
        Self {
            handlers: RwLock::new(FxHashMap::default()),
            state_handlers: RwLock::new(Vec::new()),
            sink,
            dedup: Mutex::new(DedupWindow::new(config.dedup_window)),
            toast_duration: config.toast_duration,
            metrics: Arc::new(DispatcherMetrics::default()),
        }
    }

    /// Registers a callback for one event kind.
    ///
    /// Events of that kind are delivered in arrival order; ordering
    /// across different callbacks is unspecified.
    pub fn on_event<F>(&self, kind: EventKind, callback: F)
    where
        F: Fn(&DomainEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(kind)
            .or_default()
            .push(Box::new(callback));
    }

    /// Registers a connection-state observer.
    pub fn on_connection_state_change<F>(&self, callback: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        self.state_handlers.write().push(Box::new(callback));
    }

    /// Delivers one decoded event.
    pub fn dispatch(&self, event: &DomainEvent) {
        self.metrics.events_received.fetch_add(1, Ordering::Relaxed);

        let key = DedupKey::of(event);
        if !self.dedup.lock().observe(key, Instant::now()) {
            self.metrics.events_deduped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                kind = %event.kind(),
                row = event.row_id(),
                "duplicate event collapsed"
            );
            return;
        }

        let handlers = self.handlers.read();
        if let Some(callbacks) = handlers.get(&event.kind()) {
            for callback in callbacks {
                let result =
                    std::panic::catch_unwind(AssertUnwindSafe(|| callback(event)));
                if result.is_err() {
                    self.metrics
                        .callback_failures
                        .fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        kind = %event.kind(),
                        row = event.row_id(),
                        "event callback panicked; continuing"
                    );
                }
            }
        }
        drop(handlers);
        self.metrics
            .events_dispatched
            .fetch_add(1, Ordering::Relaxed);

        self.emit_for(event);
    }

    /// Informs connection-state observers of a transition.
    pub fn connection_state_changed(&self, state: ConnectionState) {
        for callback in self.state_handlers.read().iter() {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| callback(state)));
            if result.is_err() {
                self.metrics
                    .callback_failures
                    .fetch_add(1, Ordering::Relaxed);
                tracing::warn!(%state, "state callback panicked; continuing");
            }
        }
    }

    /// Returns the dispatch metrics.
    #[must_use]
    pub fn metrics(&self) -> &Arc<DispatcherMetrics> {
        &self.metrics
    }

    fn emit_for(&self, event: &DomainEvent) {
        let (title, row) = match event {
            DomainEvent::BookingCreated { row, .. } => ("New Booking", row),
            DomainEvent::BookingUpdated { row, .. } => ("Booking Updated", row),
            // Notification rows are themselves the user-facing artifact;
            // deletes carry no news worth a toast.
            _ => return,
        };
        self.sink
            .emit(Severity::Info, title, &booking_summary(row), self.toast_duration);
        self.metrics
            .notifications_emitted
            .fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.handlers.read().len())
            .field("state_observers", &self.state_handlers.read().len())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
