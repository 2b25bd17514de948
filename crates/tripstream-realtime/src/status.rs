//! Connection state and the observable status cell.
//!
//! [`ConnectionState`] is the nominal state of the state machine in the
//! reconnection controller; [`StatusCell`] publishes it, together with
//! the last-event timestamp and the current retry attempt, over a watch
//! channel any UI component can observe.

use std::fmt;

use tokio::sync::watch;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Nominal state of the sync connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No session, or the session ended. Initial and terminal state.
    #[default]
    Disconnected,

    /// A subscription-set open is in flight or waiting out a backoff
    /// delay.
    Connecting,

    /// All required scopes are open and delivering.
    Connected,

    /// The transport reports success but has gone silent past the
    /// staleness threshold; torn down and retried immediately.
    Stale,
}

impl ConnectionState {
    /// Returns `true` when the UI should show "live".
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// Returns a stable lowercase name for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Stale => "stale",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// One observable snapshot of connectivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Current nominal connection state.
    pub state: ConnectionState,
    /// Commit timestamp of the most recent event, if any was observed
    /// this session.
    pub last_event_at_ms: Option<i64>,
    /// Retry attempts consumed since the last successful connect.
    pub attempt: u32,
}

impl StatusSnapshot {
    /// Returns `true` when the UI should show "live".
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.state.is_live()
    }
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_event_at_ms: None,
            attempt: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// StatusCell
// ---------------------------------------------------------------------------

/// Watch-channel publisher of [`StatusSnapshot`]s.
///
/// Written only by the controller task; any number of observers hold
/// receivers. Publishing with no observers is a no-op, not an error.
#[derive(Debug)]
pub struct StatusCell {
    tx: watch::Sender<StatusSnapshot>,
}

impl StatusCell {
    /// Creates a cell reporting `Disconnected`.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx }
    }

    /// Returns a receiver observing the status.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Publishes a state change.
    pub fn set_state(&self, state: ConnectionState, attempt: u32) {
        self.tx.send_modify(|snapshot| {
            snapshot.state = state;
            snapshot.attempt = attempt;
            if state == ConnectionState::Disconnected {
                snapshot.last_event_at_ms = None;
            }
        });
    }

    /// Records the commit timestamp of an observed event.
    pub fn record_event(&self, at_ms: i64) {
        self.tx.send_modify(|snapshot| {
            snapshot.last_event_at_ms = Some(at_ms);
        });
    }

    /// Returns the current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_connected_is_live() {
        assert!(ConnectionState::Connected.is_live());
        assert!(!ConnectionState::Disconnected.is_live());
        assert!(!ConnectionState::Connecting.is_live());
        assert!(!ConnectionState::Stale.is_live());
    }

    #[test]
    fn cell_starts_disconnected() {
        let cell = StatusCell::new();
        let snapshot = cell.snapshot();
        assert_eq!(snapshot.state, ConnectionState::Disconnected);
        assert_eq!(snapshot.last_event_at_ms, None);
        assert!(!snapshot.is_live());
    }

    #[test]
    fn set_state_and_record_event() {
        let cell = StatusCell::new();
        cell.set_state(ConnectionState::Connected, 0);
        cell.record_event(12_345);

        let snapshot = cell.snapshot();
        assert!(snapshot.is_live());
        assert_eq!(snapshot.last_event_at_ms, Some(12_345));
    }

    #[test]
    fn disconnect_clears_last_event() {
        let cell = StatusCell::new();
        cell.set_state(ConnectionState::Connected, 0);
        cell.record_event(1);
        cell.set_state(ConnectionState::Disconnected, 0);
        assert_eq!(cell.snapshot().last_event_at_ms, None);
    }

    #[tokio::test]
    async fn observers_see_updates() {
        let cell = StatusCell::new();
        let mut rx = cell.subscribe();

        cell.set_state(ConnectionState::Connecting, 2);
        rx.changed().await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.state, ConnectionState::Connecting);
        assert_eq!(snapshot.attempt, 2);
    }

    #[test]
    fn publishing_without_observers_is_fine() {
        let cell = StatusCell::new();
        cell.set_state(ConnectionState::Connected, 0);
        assert!(cell.snapshot().is_live());
    }
}
