//! # Tripstream Core
//!
//! Domain types shared by the Tripstream real-time sync layer:
//!
//! - [`identity`] — authenticated identity, roles, and the observable
//!   session value the sync layer reacts to
//! - [`model`] — table names and typed row projections (bookings,
//!   notifications)
//! - [`event`] — raw change-feed messages, typed domain events, and the
//!   pure decoder between them
//!
//! This crate is deliberately free of async machinery beyond the watch
//! channel used to publish the session identity; the stateful pipeline
//! lives in `tripstream-realtime`.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod event;
pub mod identity;
pub mod model;

pub use event::{ChangeOp, DecodeError, DomainEvent, EventKind, RawChangeMessage};
pub use identity::{Identity, Role, SessionIdentity};
pub use model::{BookingRow, BookingStatus, NotificationRow, Table};
