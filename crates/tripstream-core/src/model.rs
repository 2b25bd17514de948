//! Table names and typed row projections.
//!
//! Rows arrive from the change feed as JSON objects; these projections
//! pick out the columns the sync layer and its consumers care about and
//! silently ignore the rest, so schema additions on the server never
//! break decoding.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A replicated table the sync layer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// The bookings table.
    Bookings,
    /// The per-user notifications table.
    Notifications,
}

impl Table {
    /// Returns the wire name of the table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Bookings => "bookings",
            Table::Notifications => "notifications",
        }
    }

    /// Parses a wire table name. Unknown tables yield `None`.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bookings" => Some(Table::Bookings),
            "notifications" => Some(Table::Notifications),
            _ => None,
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BookingStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a booking row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Quote started, not yet confirmed.
    #[default]
    Draft,
    /// Confirmed and paid (or payment pending per agency policy).
    Confirmed,
    /// Cancelled by the customer or the agency.
    Cancelled,
    /// Travel completed.
    Completed,
    /// A status this client version does not know about.
    #[serde(other)]
    Unknown,
}

// ---------------------------------------------------------------------------
// BookingRow
// ---------------------------------------------------------------------------

/// Full-row projection of a bookings record.
///
/// Update events carry the complete new row, never a diff; consumers
/// replace their local copy wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRow {
    /// Primary key.
    pub id: String,
    /// Human-facing booking reference (e.g. "PNR-1042").
    #[serde(default)]
    pub reference: String,
    /// Name of the travelling customer.
    #[serde(default)]
    pub customer_name: String,
    /// Id of the owning agent.
    #[serde(default)]
    pub agent_id: String,
    /// Lifecycle status.
    #[serde(default)]
    pub status: BookingStatus,
    /// Total price in minor currency units.
    #[serde(default)]
    pub total_cents: i64,
    /// ISO 4217 currency code.
    #[serde(default)]
    pub currency: String,
    /// Last server-side modification, milliseconds since the Unix epoch.
    #[serde(default)]
    pub updated_at_ms: i64,
}

impl BookingRow {
    /// Returns the best human-facing label for this booking: the
    /// reference when present, the row id otherwise.
    #[must_use]
    pub fn label(&self) -> &str {
        if self.reference.is_empty() {
            &self.id
        } else {
            &self.reference
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationRow
// ---------------------------------------------------------------------------

/// Full-row projection of a notifications record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRow {
    /// Primary key.
    pub id: String,
    /// Recipient user id.
    #[serde(default)]
    pub user_id: String,
    /// Short title.
    #[serde(default)]
    pub title: String,
    /// Body text.
    #[serde(default)]
    pub body: String,
    /// Creation time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at_ms: i64,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn table_round_trip() {
        assert_eq!(Table::parse("bookings"), Some(Table::Bookings));
        assert_eq!(Table::parse("notifications"), Some(Table::Notifications));
        assert_eq!(Table::parse("invoices"), None);
        assert_eq!(Table::Bookings.to_string(), "bookings");
    }

    #[test]
    fn booking_row_tolerates_extra_columns() {
        let row: BookingRow = serde_json::from_value(json!({
            "id": "bk1",
            "reference": "PNR-1042",
            "customer_name": "Alice Chen",
            "agent_id": "u1",
            "status": "confirmed",
            "total_cents": 189_900,
            "currency": "EUR",
            "updated_at_ms": 1_700_000_000_000_i64,
            "internal_notes": "window seat",
            "destination": "Lisbon"
        }))
        .unwrap();

        assert_eq!(row.id, "bk1");
        assert_eq!(row.status, BookingStatus::Confirmed);
        assert_eq!(row.total_cents, 189_900);
    }

    #[test]
    fn booking_row_defaults_missing_columns() {
        let row: BookingRow = serde_json::from_value(json!({ "id": "bk2" })).unwrap();
        assert_eq!(row.reference, "");
        assert_eq!(row.status, BookingStatus::Draft);
        assert_eq!(row.total_cents, 0);
    }

    #[test]
    fn booking_row_requires_id() {
        let result: Result<BookingRow, _> =
            serde_json::from_value(json!({ "reference": "PNR-1" }));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_status_maps_to_unknown() {
        let row: BookingRow =
            serde_json::from_value(json!({ "id": "bk3", "status": "on_hold" })).unwrap();
        assert_eq!(row.status, BookingStatus::Unknown);
    }

    #[test]
    fn booking_label_prefers_reference() {
        let mut row: BookingRow = serde_json::from_value(json!({ "id": "bk4" })).unwrap();
        assert_eq!(row.label(), "bk4");
        row.reference = "PNR-7".into();
        assert_eq!(row.label(), "PNR-7");
    }

    #[test]
    fn notification_row_parses() {
        let row: NotificationRow = serde_json::from_value(json!({
            "id": "n1",
            "user_id": "u1",
            "title": "Booking confirmed",
            "body": "PNR-1042 is confirmed",
            "created_at_ms": 1_700_000_000_000_i64
        }))
        .unwrap();
        assert_eq!(row.title, "Booking confirmed");
    }
}
