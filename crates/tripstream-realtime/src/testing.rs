//! Test doubles for the sync subsystem.
//!
//! Provides a scriptable in-memory change feed, a recording
//! notification sink, row/message builders, and small async helpers.
//! Used by this crate's own tests and available to applications testing
//! their callback wiring.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tripstream_core::RawChangeMessage;

use crate::error::FeedError;
use crate::feed::{ChangeFeed, FeedHandle};
use crate::notify::{NotificationSink, Severity};
use crate::scope::SubscriptionScope;
use crate::status::{ConnectionState, StatusSnapshot};

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ActiveSubscription {
    handle: FeedHandle,
    scope: SubscriptionScope,
    sender: mpsc::Sender<RawChangeMessage>,
}

#[derive(Debug, Default)]
struct MockFeedState {
    active: Vec<ActiveSubscription>,
    fail_scopes: HashSet<String>,
    fail_all: bool,
    fail_unsubscribes: bool,
    subscribe_delay: Option<Duration>,
    unsubscribed: u64,
}

/// In-memory change feed with scriptable failures.
///
/// Delivery is by table: a pushed message reaches every active
/// subscription whose scope replicates that table (which is exactly how
/// an admin scope and a personal scope double-deliver the same row).
/// Server-side filters are not evaluated.
#[derive(Debug, Default)]
pub struct MockFeed {
    state: Mutex<MockFeedState>,
    next_id: AtomicU64,
    subscribe_calls: AtomicU64,
}

impl MockFeed {
    /// Makes opening the named scope fail.
    pub fn fail_scope(&self, name: &str) {
        self.state.lock().fail_scopes.insert(name.to_string());
    }

    /// Makes every subscribe fail (`true`) or succeed (`false`).
    pub fn fail_all(&self, fail: bool) {
        self.state.lock().fail_all = fail;
    }

    /// Makes unsubscribes report a transport error.
    pub fn fail_unsubscribes(&self, fail: bool) {
        self.state.lock().fail_unsubscribes = fail;
    }

    /// Delays every subscribe by `delay` (to hold an open in flight).
    pub fn delay_subscribes(&self, delay: Duration) {
        self.state.lock().subscribe_delay = Some(delay);
    }

    /// Clears scripted failures and delays.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.fail_scopes.clear();
        state.fail_all = false;
        state.fail_unsubscribes = false;
        state.subscribe_delay = None;
    }

    /// Returns the number of currently open subscriptions.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Returns the scope names of the open subscriptions, in open order.
    #[must_use]
    pub fn active_scopes(&self) -> Vec<String> {
        self.state
            .lock()
            .active
            .iter()
            .map(|sub| sub.scope.name().to_string())
            .collect()
    }

    /// Returns how many subscriptions have been torn down.
    #[must_use]
    pub fn unsubscribe_count(&self) -> u64 {
        self.state.lock().unsubscribed
    }

    /// Returns how many subscribe calls have been made in total.
    #[must_use]
    pub fn subscribe_calls(&self) -> u64 {
        self.subscribe_calls.load(Ordering::Relaxed)
    }

    /// Pushes a change message to every subscription replicating its
    /// table. Returns the number of copies delivered.
    pub async fn push(&self, message: RawChangeMessage) -> usize {
        let targets: Vec<(String, mpsc::Sender<RawChangeMessage>)> = self
            .state
            .lock()
            .active
            .iter()
            .filter(|sub| sub.scope.table().as_str() == message.table)
            .map(|sub| (sub.scope.name().to_string(), sub.sender.clone()))
            .collect();

        let mut delivered = 0;
        for (scope_name, sender) in targets {
            let copy = message.clone().with_scope(scope_name);
            if sender.send(copy).await.is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[async_trait]
impl ChangeFeed for MockFeed {
    async fn subscribe(
        &self,
        scope: &SubscriptionScope,
        events: mpsc::Sender<RawChangeMessage>,
    ) -> Result<FeedHandle, FeedError> {
        self.subscribe_calls.fetch_add(1, Ordering::Relaxed);

        let delay = self.state.lock().subscribe_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.fail_all || state.fail_scopes.contains(scope.name()) {
            return Err(FeedError::Rejected(format!(
                "scripted failure for '{}'",
                scope.name()
            )));
        }

        let handle = FeedHandle::new(
            self.next_id.fetch_add(1, Ordering::Relaxed),
            scope.name(),
        );
        state.active.push(ActiveSubscription {
            handle: handle.clone(),
            scope: scope.clone(),
            sender: events,
        });
        Ok(handle)
    }

    async fn unsubscribe(&self, handle: &FeedHandle) -> Result<(), FeedError> {
        let mut state = self.state.lock();
        if let Some(index) = state
            .active
            .iter()
            .position(|sub| sub.handle.id() == handle.id())
        {
            state.active.remove(index);
            state.unsubscribed += 1;
        }
        if state.fail_unsubscribes {
            return Err(FeedError::ConnectionFailed("scripted failure".into()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// One notification captured by [`RecordingSink`].
#[derive(Debug, Clone)]
pub struct EmittedNotification {
    /// Severity as emitted.
    pub severity: Severity,
    /// Title as emitted.
    pub title: String,
    /// Body as emitted.
    pub body: String,
    /// Display duration as emitted.
    pub duration: Duration,
}

/// Notification sink that records everything it is given.
#[derive(Debug, Default)]
pub struct RecordingSink {
    emitted: Mutex<Vec<EmittedNotification>>,
}

impl RecordingSink {
    /// Returns everything emitted so far.
    #[must_use]
    pub fn emitted(&self) -> Vec<EmittedNotification> {
        self.emitted.lock().clone()
    }

    /// Returns just the titles, in emission order.
    #[must_use]
    pub fn titles(&self) -> Vec<String> {
        self.emitted
            .lock()
            .iter()
            .map(|notification| notification.title.clone())
            .collect()
    }
}

impl NotificationSink for RecordingSink {
    fn emit(&self, severity: Severity, title: &str, body: &str, duration: Duration) {
        self.emitted.lock().push(EmittedNotification {
            severity,
            title: title.to_string(),
            body: body.to_string(),
            duration,
        });
    }
}

// ---------------------------------------------------------------------------
// Builders and helpers
// ---------------------------------------------------------------------------

/// Builds a plausible bookings row payload.
#[must_use]
pub fn booking_json(id: &str) -> Value {
    json!({
        "id": id,
        "reference": format!("PNR-{id}"),
        "customer_name": "Alice Chen",
        "agent_id": "u1",
        "status": "confirmed",
        "total_cents": 189_900,
        "currency": "EUR"
    })
}

/// Builds a plausible notifications row payload.
#[must_use]
pub fn notification_json(id: &str, user_id: &str) -> Value {
    json!({
        "id": id,
        "user_id": user_id,
        "title": "Booking confirmed",
        "body": "Your booking is confirmed",
    })
}

/// Waits (bounded) until the status reports the wanted state.
///
/// # Panics
///
/// Panics if the state is not reached within two seconds — test-only by
/// design.
pub async fn wait_for_state(
    status: &mut watch::Receiver<StatusSnapshot>,
    wanted: ConnectionState,
) {
    let result = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if status.borrow_and_update().state == wanted {
                return;
            }
            if status.changed().await.is_err() {
                panic!("status channel closed while waiting for {wanted}");
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for state {wanted}");
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tripstream_core::{ChangeOp, Identity, Role};

    #[tokio::test]
    async fn mock_feed_delivers_by_table() {
        let feed = MockFeed::default();
        let identity = Identity::new("u1", Role::Agent);
        let (tx, mut rx) = mpsc::channel(16);

        feed.subscribe(&SubscriptionScope::personal_bookings(&identity), tx.clone())
            .await
            .unwrap();
        feed.subscribe(
            &SubscriptionScope::personal_notifications(&identity),
            tx,
        )
        .await
        .unwrap();

        let delivered = feed
            .push(RawChangeMessage::insert("bookings", 1000, booking_json("bk1")))
            .await;
        assert_eq!(delivered, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.op, ChangeOp::Insert);
        assert_eq!(received.scope, "bookings-agent-u1");
    }

    #[tokio::test]
    async fn mock_feed_double_delivers_to_overlapping_scopes() {
        let feed = MockFeed::default();
        let identity = Identity::new("u1", Role::BasicAdmin);
        let (tx, _rx) = mpsc::channel(16);

        feed.subscribe(&SubscriptionScope::personal_bookings(&identity), tx.clone())
            .await
            .unwrap();
        feed.subscribe(&SubscriptionScope::all_bookings(), tx)
            .await
            .unwrap();

        let delivered = feed
            .push(RawChangeMessage::insert("bookings", 1000, booking_json("bk1")))
            .await;
        assert_eq!(delivered, 2);
    }

    #[tokio::test]
    async fn mock_feed_scripted_failure() {
        let feed = MockFeed::default();
        let (tx, _rx) = mpsc::channel(16);
        feed.fail_scope("bookings-all");

        let result = feed.subscribe(&SubscriptionScope::all_bookings(), tx).await;
        assert!(matches!(result, Err(FeedError::Rejected(_))));
        assert_eq!(feed.subscribe_calls(), 1);
        assert_eq!(feed.active_count(), 0);
    }

    #[test]
    fn recording_sink_captures_order() {
        let sink = RecordingSink::default();
        sink.emit(Severity::Info, "first", "a", Duration::from_secs(1));
        sink.emit(Severity::Warning, "second", "b", Duration::from_secs(1));
        assert_eq!(sink.titles(), vec!["first".to_string(), "second".to_string()]);
        assert_eq!(sink.emitted()[1].severity, Severity::Warning);
    }
}
