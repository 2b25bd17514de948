//! # Tripstream Realtime
//!
//! The real-time synchronization subsystem of the Tripstream booking
//! CRM: keeps client sessions consistent with server-side row changes
//! by subscribing to a server-pushed change feed, scoped by the
//! signed-in identity's role, and recovering from failures with bounded
//! exponential backoff.
//!
//! ## Pipeline
//!
//! ```text
//! SessionIdentity ──▶ ReconnectionController ──▶ SubscriptionManager ──▶ ChangeFeed
//!   (watch)              │ owner task                (open/close)        (transport)
//!                        │
//!   RawChangeMessage ◀───┘ decode ──▶ Dispatcher ──▶ application callbacks
//!        (mpsc)                          │  dedup          + NotificationSink
//!                                        ▼
//!                                  StatusCell (live/offline, last event)
//! ```
//!
//! The controller is the single owner of connection state, the backoff
//! counter, and the open handle set; everything else consumes the event
//! stream read-only. Wire it like this:
//!
//! ```rust,ignore
//! let session = SessionIdentity::new();
//! let controller = ReconnectionController::new(
//!     RealtimeConfig::default(),
//!     feed,     // Arc<dyn ChangeFeed>
//!     sink,     // Arc<dyn NotificationSink>
//!     session.watch(),
//! );
//!
//! let dispatcher = controller.dispatcher();
//! dispatcher.on_event(EventKind::BookingCreated, |event| { /* ... */ });
//!
//! let status = controller.status();        // live/offline for the UI
//! let handle = controller.spawn();
//!
//! session.sign_in(identity);               // scopes open, events flow
//! // ...
//! handle.shutdown().await;                 // everything torn down
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss
    )
)]

/// Sync-subsystem configuration.
pub mod config;

/// The reconnection controller and its handle.
pub mod controller;

/// Event routing to application callbacks.
pub mod dispatcher;

/// Error types.
pub mod error;

/// The change-feed collaborator trait.
pub mod feed;

/// Silent-failure detection.
pub mod health;

/// Subscription set management.
pub mod manager;

/// Pipeline metrics.
pub mod metrics;

/// User-facing notification emission.
pub mod notify;

/// Reconnect backoff policy.
pub mod retry;

/// Subscription scopes derived from identity.
pub mod scope;

/// Connection state and the observable status cell.
pub mod status;

/// Test doubles (mock feed, recording sink).
pub mod testing;

pub use config::RealtimeConfig;
pub use controller::{ControllerHandle, ReconnectionController};
pub use dispatcher::{Dispatcher, DispatcherMetrics};
pub use error::{FeedError, OpenError};
pub use feed::{ChangeFeed, FeedHandle};
pub use health::HealthMonitor;
pub use manager::{ScopeHandles, SubscriptionManager};
pub use metrics::RealtimeMetrics;
pub use notify::{booking_summary, NotificationSink, NullSink, Severity};
pub use retry::{BackoffPolicy, BackoffState};
pub use scope::{scopes_for, SubscriptionScope};
pub use status::{ConnectionState, StatusCell, StatusSnapshot};
