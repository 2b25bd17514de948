//! Sync-subsystem error types.
//!
//! Two layers: [`FeedError`] is what the change-feed transport can
//! report, [`OpenError`] wraps it with the scope that failed during a
//! subscription-set open. Both feed the retry path; neither ever
//! escapes the subsystem as an unhandled fault.

use thiserror::Error;

/// Errors reported by a change-feed transport.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The transport could not reach the server.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The server refused the subscription (bad filter, missing grant).
    #[error("subscription rejected: {0}")]
    Rejected(String),

    /// The feed has been closed and accepts no further operations.
    #[error("feed closed")]
    Closed,

    /// An I/O error from the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A subscription-set open failed.
///
/// Carries the scope that failed; every scope opened before it has
/// already been closed again by the time this error is returned
/// (all-or-nothing open).
#[derive(Debug, Error)]
#[error("failed to open scope '{scope}': {source}")]
pub struct OpenError {
    /// Name of the scope that failed to open.
    pub scope: String,
    /// The transport failure.
    #[source]
    pub source: FeedError,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_error_display() {
        let err = FeedError::ConnectionFailed("host unreachable".into());
        assert_eq!(err.to_string(), "connection failed: host unreachable");
    }

    #[test]
    fn open_error_names_the_scope() {
        let err = OpenError {
            scope: "bookings-all".into(),
            source: FeedError::Rejected("missing grant".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("bookings-all"));
        assert!(msg.contains("missing grant"));
    }
}
