//! User-facing notification emission.
//!
//! The sink is fire-and-forget: the subsystem never consumes a return
//! value and never blocks on it. The hosting application wires it to
//! whatever toast/banner surface it renders.

use std::fmt;
use std::time::Duration;

use tripstream_core::BookingRow;

// ---------------------------------------------------------------------------
// Severity
// ---------------------------------------------------------------------------

/// Visual severity of an emitted notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Neutral information.
    Info,
    /// A positive outcome (e.g. connection restored).
    Success,
    /// Something degraded but recovering (e.g. reconnecting).
    Warning,
    /// Something failed.
    Error,
}

impl Severity {
    /// Returns a stable lowercase name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NotificationSink
// ---------------------------------------------------------------------------

/// Fire-and-forget notification emission.
pub trait NotificationSink: Send + Sync {
    /// Emits one user-facing notification.
    ///
    /// Must not block; implementations queue or drop as they see fit.
    fn emit(&self, severity: Severity, title: &str, body: &str, duration: Duration);
}

/// A sink that discards everything. Useful for headless deployments.
#[derive(Debug, Default)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn emit(&self, _severity: Severity, _title: &str, _body: &str, _duration: Duration) {}
}

// ---------------------------------------------------------------------------
// Summaries
// ---------------------------------------------------------------------------

/// Builds the human-readable one-liner for a booking notification.
///
/// "PNR-1042 — Alice Chen" when both are known, degrading gracefully to
/// whatever the row carries.
#[must_use]
pub fn booking_summary(row: &BookingRow) -> String {
    if row.customer_name.is_empty() {
        row.label().to_string()
    } else {
        format!("{} — {}", row.label(), row.customer_name)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn severity_names() {
        assert_eq!(Severity::Info.as_str(), "info");
        assert_eq!(Severity::Warning.to_string(), "warning");
    }

    #[test]
    fn summary_with_reference_and_customer() {
        let row: BookingRow = serde_json::from_value(json!({
            "id": "bk1",
            "reference": "PNR-1042",
            "customer_name": "Alice Chen"
        }))
        .unwrap();
        assert_eq!(booking_summary(&row), "PNR-1042 — Alice Chen");
    }

    #[test]
    fn summary_degrades_to_row_id() {
        let row: BookingRow = serde_json::from_value(json!({ "id": "bk1" })).unwrap();
        assert_eq!(booking_summary(&row), "bk1");
    }

    #[test]
    fn null_sink_accepts_anything() {
        NullSink.emit(Severity::Error, "t", "b", Duration::from_secs(1));
    }
}
