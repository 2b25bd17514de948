//! Change-feed messages, typed domain events, and the decoder.
//!
//! [`RawChangeMessage`] is the transport-level payload: one row change as
//! the feed delivers it. [`DomainEvent`] is what the rest of the system
//! consumes: a typed, validated event with a stable kind. The decoder
//! between them is a pure function — the same message always yields the
//! same event or the same failure, and unknown `(table, op)` pairs are a
//! recoverable [`DecodeError`], never a panic.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{BookingRow, NotificationRow, Table};

// ---------------------------------------------------------------------------
// ChangeOp
// ---------------------------------------------------------------------------

/// Row-level operation reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    /// A new row was inserted.
    Insert,
    /// An existing row was updated.
    Update,
    /// A row was deleted.
    Delete,
}

impl ChangeOp {
    /// Returns the wire name of the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeOp::Insert => "INSERT",
            ChangeOp::Update => "UPDATE",
            ChangeOp::Delete => "DELETE",
        }
    }
}

impl fmt::Display for ChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RawChangeMessage
// ---------------------------------------------------------------------------

/// One transport-level change message, consumed exactly once by the
/// decoder.
///
/// `new_row` is present for inserts and updates, `old_row` for deletes
/// (and, depending on server replica-identity settings, for updates —
/// the decoder ignores it there: updates are full-replace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawChangeMessage {
    /// The row operation.
    pub op: ChangeOp,
    /// Wire name of the table the change belongs to.
    pub table: String,
    /// Name of the scope whose server-side filter matched this change.
    #[serde(default)]
    pub scope: String,
    /// Commit timestamp, milliseconds since the Unix epoch.
    pub ts_ms: i64,
    /// The row after the change (inserts and updates).
    #[serde(default)]
    pub new_row: Option<Value>,
    /// The row before the change (deletes, optionally updates).
    #[serde(default)]
    pub old_row: Option<Value>,
}

impl RawChangeMessage {
    /// Creates an insert message.
    #[must_use]
    pub fn insert(table: impl Into<String>, ts_ms: i64, row: Value) -> Self {
        Self {
            op: ChangeOp::Insert,
            table: table.into(),
            scope: String::new(),
            ts_ms,
            new_row: Some(row),
            old_row: None,
        }
    }

    /// Creates an update message carrying the full new row.
    #[must_use]
    pub fn update(table: impl Into<String>, ts_ms: i64, row: Value) -> Self {
        Self {
            op: ChangeOp::Update,
            table: table.into(),
            scope: String::new(),
            ts_ms,
            new_row: Some(row),
            old_row: None,
        }
    }

    /// Creates a delete message carrying the old row.
    #[must_use]
    pub fn delete(table: impl Into<String>, ts_ms: i64, row: Value) -> Self {
        Self {
            op: ChangeOp::Delete,
            table: table.into(),
            scope: String::new(),
            ts_ms,
            new_row: None,
            old_row: Some(row),
        }
    }

    /// Tags the message with the delivering scope's name.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }
}

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Discriminant for decoded domain events; the dispatcher's routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A booking row was inserted.
    BookingCreated,
    /// A booking row was updated (full replace).
    BookingUpdated,
    /// A booking row was deleted.
    BookingDeleted,
    /// A notification row was inserted.
    NotificationCreated,
}

impl EventKind {
    /// Returns a stable name for logs and metrics labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::BookingCreated => "booking_created",
            EventKind::BookingUpdated => "booking_updated",
            EventKind::BookingDeleted => "booking_deleted",
            EventKind::NotificationCreated => "notification_created",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DecodeError
// ---------------------------------------------------------------------------

/// Failure to decode a [`RawChangeMessage`].
///
/// All variants are recoverable: the message is logged and dropped, and
/// the pipeline continues.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The `(table, op)` pair has no domain meaning.
    #[error("unrecognized event: {op} on table '{table}'")]
    UnrecognizedEvent {
        /// Wire table name as received.
        table: String,
        /// The reported operation.
        op: ChangeOp,
    },

    /// The message lacked the row payload its operation requires.
    #[error("missing {side} payload for {op} on table '{table}'")]
    MissingPayload {
        /// Wire table name as received.
        table: String,
        /// The reported operation.
        op: ChangeOp,
        /// Which side was expected ("new row" or "old row").
        side: &'static str,
    },

    /// The row payload did not match the table's projection.
    #[error("malformed row payload for table '{table}': {source}")]
    Payload {
        /// Wire table name as received.
        table: String,
        /// The underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },
}

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// A decoded, typed change event.
///
/// `observed_at_ms` is the feed's commit timestamp, not a local clock
/// read, which keeps [`DomainEvent::decode`] pure and makes the dedup
/// key reproducible.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    /// A booking was created.
    BookingCreated {
        /// The inserted row.
        row: BookingRow,
        /// Commit timestamp, milliseconds since the Unix epoch.
        observed_at_ms: i64,
    },
    /// A booking was updated. The row is the complete new state;
    /// consumers replace, never merge.
    BookingUpdated {
        /// The full new row.
        row: BookingRow,
        /// Commit timestamp, milliseconds since the Unix epoch.
        observed_at_ms: i64,
    },
    /// A booking was deleted.
    BookingDeleted {
        /// The row as it was before deletion.
        row: BookingRow,
        /// Commit timestamp, milliseconds since the Unix epoch.
        observed_at_ms: i64,
    },
    /// A notification was created for the signed-in user.
    NotificationCreated {
        /// The inserted row.
        row: NotificationRow,
        /// Commit timestamp, milliseconds since the Unix epoch.
        observed_at_ms: i64,
    },
}

impl DomainEvent {
    /// Decodes a transport message into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::UnrecognizedEvent`] for `(table, op)` pairs
    /// with no domain meaning, [`DecodeError::MissingPayload`] when the
    /// required row side is absent, and [`DecodeError::Payload`] when the
    /// row does not match the table's projection.
    pub fn decode(msg: &RawChangeMessage) -> Result<Self, DecodeError> {
        let table = Table::parse(&msg.table).ok_or_else(|| DecodeError::UnrecognizedEvent {
            table: msg.table.clone(),
            op: msg.op,
        })?;

        match (table, msg.op) {
            (Table::Bookings, ChangeOp::Insert) => Ok(DomainEvent::BookingCreated {
                row: booking_row(msg, &msg.new_row, "new row")?,
                observed_at_ms: msg.ts_ms,
            }),
            (Table::Bookings, ChangeOp::Update) => Ok(DomainEvent::BookingUpdated {
                row: booking_row(msg, &msg.new_row, "new row")?,
                observed_at_ms: msg.ts_ms,
            }),
            (Table::Bookings, ChangeOp::Delete) => Ok(DomainEvent::BookingDeleted {
                row: booking_row(msg, &msg.old_row, "old row")?,
                observed_at_ms: msg.ts_ms,
            }),
            (Table::Notifications, ChangeOp::Insert) => Ok(DomainEvent::NotificationCreated {
                row: notification_row(msg, &msg.new_row)?,
                observed_at_ms: msg.ts_ms,
            }),
            (Table::Notifications, ChangeOp::Update | ChangeOp::Delete) => {
                Err(DecodeError::UnrecognizedEvent {
                    table: msg.table.clone(),
                    op: msg.op,
                })
            }
        }
    }

    /// Returns the event's kind (the dispatcher routing key).
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::BookingCreated { .. } => EventKind::BookingCreated,
            DomainEvent::BookingUpdated { .. } => EventKind::BookingUpdated,
            DomainEvent::BookingDeleted { .. } => EventKind::BookingDeleted,
            DomainEvent::NotificationCreated { .. } => EventKind::NotificationCreated,
        }
    }

    /// Returns the id of the affected row.
    #[must_use]
    pub fn row_id(&self) -> &str {
        match self {
            DomainEvent::BookingCreated { row, .. }
            | DomainEvent::BookingUpdated { row, .. }
            | DomainEvent::BookingDeleted { row, .. } => &row.id,
            DomainEvent::NotificationCreated { row, .. } => &row.id,
        }
    }

    /// Returns the commit timestamp in milliseconds since the Unix epoch.
    #[must_use]
    pub fn observed_at_ms(&self) -> i64 {
        match self {
            DomainEvent::BookingCreated { observed_at_ms, .. }
            | DomainEvent::BookingUpdated { observed_at_ms, .. }
            | DomainEvent::BookingDeleted { observed_at_ms, .. }
            | DomainEvent::NotificationCreated { observed_at_ms, .. } => *observed_at_ms,
        }
    }

    /// Returns the commit timestamp truncated to whole seconds — the
    /// resolution at which duplicates from multiplexed scopes collapse.
    #[must_use]
    pub fn observed_at_secs(&self) -> i64 {
        self.observed_at_ms().div_euclid(1000)
    }
}

fn booking_row(
    msg: &RawChangeMessage,
    side: &Option<Value>,
    side_name: &'static str,
) -> Result<BookingRow, DecodeError> {
    let value = side.as_ref().ok_or(DecodeError::MissingPayload {
        table: msg.table.clone(),
        op: msg.op,
        side: side_name,
    })?;
    serde_json::from_value(value.clone()).map_err(|source| DecodeError::Payload {
        table: msg.table.clone(),
        source,
    })
}

fn notification_row(
    msg: &RawChangeMessage,
    side: &Option<Value>,
) -> Result<NotificationRow, DecodeError> {
    let value = side.as_ref().ok_or(DecodeError::MissingPayload {
        table: msg.table.clone(),
        op: msg.op,
        side: "new row",
    })?;
    serde_json::from_value(value.clone()).map_err(|source| DecodeError::Payload {
        table: msg.table.clone(),
        source,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn booking(id: &str) -> Value {
        json!({
            "id": id,
            "reference": "PNR-1042",
            "customer_name": "Alice Chen",
            "agent_id": "u1",
            "status": "confirmed",
            "total_cents": 189_900,
            "currency": "EUR"
        })
    }

    #[test]
    fn decodes_booking_insert() {
        let msg = RawChangeMessage::insert("bookings", 5000, booking("bk1"));
        let event = DomainEvent::decode(&msg).unwrap();
        assert_eq!(event.kind(), EventKind::BookingCreated);
        assert_eq!(event.row_id(), "bk1");
        assert_eq!(event.observed_at_ms(), 5000);
    }

    #[test]
    fn decodes_booking_update_as_full_replace() {
        let mut msg = RawChangeMessage::update("bookings", 6000, booking("bk1"));
        // A replica-identity-full server also sends the old row; the
        // decoder must ignore it and carry only the new state.
        msg.old_row = Some(json!({ "id": "bk1", "status": "draft" }));

        let event = DomainEvent::decode(&msg).unwrap();
        match event {
            DomainEvent::BookingUpdated { row, .. } => {
                assert_eq!(row.status, crate::model::BookingStatus::Confirmed);
            }
            other => panic!("expected BookingUpdated, got {other:?}"),
        }
    }

    #[test]
    fn decodes_booking_delete_from_old_row() {
        let msg = RawChangeMessage::delete("bookings", 7000, booking("bk9"));
        let event = DomainEvent::decode(&msg).unwrap();
        assert_eq!(event.kind(), EventKind::BookingDeleted);
        assert_eq!(event.row_id(), "bk9");
    }

    #[test]
    fn decodes_notification_insert() {
        let msg = RawChangeMessage::insert(
            "notifications",
            8000,
            json!({ "id": "n1", "user_id": "u1", "title": "Hi", "body": "there" }),
        );
        let event = DomainEvent::decode(&msg).unwrap();
        assert_eq!(event.kind(), EventKind::NotificationCreated);
    }

    #[test]
    fn unknown_table_is_unrecognized() {
        let msg = RawChangeMessage::insert("invoices", 1000, json!({ "id": "i1" }));
        let err = DomainEvent::decode(&msg).unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedEvent { .. }));
        assert!(err.to_string().contains("invoices"));
    }

    #[test]
    fn notification_update_and_delete_are_unrecognized() {
        let update = RawChangeMessage::update("notifications", 1000, json!({ "id": "n1" }));
        assert!(matches!(
            DomainEvent::decode(&update),
            Err(DecodeError::UnrecognizedEvent { .. })
        ));

        let delete = RawChangeMessage::delete("notifications", 1000, json!({ "id": "n1" }));
        assert!(matches!(
            DomainEvent::decode(&delete),
            Err(DecodeError::UnrecognizedEvent { .. })
        ));
    }

    #[test]
    fn missing_payload_is_reported() {
        let mut msg = RawChangeMessage::insert("bookings", 1000, json!({ "id": "bk1" }));
        msg.new_row = None;
        let err = DomainEvent::decode(&msg).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::MissingPayload {
                side: "new row",
                ..
            }
        ));
    }

    #[test]
    fn malformed_payload_is_reported() {
        let msg = RawChangeMessage::insert("bookings", 1000, json!("not an object"));
        let err = DomainEvent::decode(&msg).unwrap_err();
        assert!(matches!(err, DecodeError::Payload { .. }));
    }

    #[test]
    fn decode_is_pure() {
        let msg = RawChangeMessage::insert("bookings", 5000, booking("bk1"));
        let a = DomainEvent::decode(&msg).unwrap();
        let b = DomainEvent::decode(&msg).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn second_truncation_for_dedup() {
        let msg = RawChangeMessage::insert("bookings", 5999, booking("bk1"));
        let event = DomainEvent::decode(&msg).unwrap();
        assert_eq!(event.observed_at_secs(), 5);

        let msg = RawChangeMessage::insert("bookings", -1, booking("bk1"));
        let event = DomainEvent::decode(&msg).unwrap();
        assert_eq!(event.observed_at_secs(), -1);
    }

    #[test]
    fn change_op_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&ChangeOp::Insert).unwrap(), "\"INSERT\"");
        let op: ChangeOp = serde_json::from_str("\"DELETE\"").unwrap();
        assert_eq!(op, ChangeOp::Delete);
    }
}
