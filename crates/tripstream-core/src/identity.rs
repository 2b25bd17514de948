//! Authenticated identity and the observable session value.
//!
//! The sync layer never authenticates anyone; it reads the current
//! [`Identity`] from a [`SessionIdentity`] watch channel owned by the
//! hosting application and reacts to sign-in/sign-out edges.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Role of an authenticated CRM user.
///
/// Roles are ordered by privilege only in the sense of which subscription
/// scopes they require; the sync layer performs no authorization itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A travel agent: sees their own bookings and notifications.
    Agent,
    /// An admin with the standard dashboard: additionally sees all bookings.
    BasicAdmin,
    /// A super admin: same subscription footprint as [`Role::BasicAdmin`].
    SuperAdmin,
}

impl Role {
    /// Returns `true` if this role is entitled to the all-bookings feed.
    #[must_use]
    pub fn sees_all_bookings(self) -> bool {
        matches!(self, Role::BasicAdmin | Role::SuperAdmin)
    }

    /// Returns the wire name of the role.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::BasicAdmin => "basic_admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// An authenticated identity.
///
/// Owned by the authentication collaborator; the sync layer only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user id (the row owner key in the store).
    pub id: String,
    /// The user's role, which determines the required subscription scopes.
    pub role: Role,
}

impl Identity {
    /// Creates an identity.
    #[must_use]
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }
}

// ---------------------------------------------------------------------------
// SessionIdentity
// ---------------------------------------------------------------------------

/// Observable session identity.
///
/// Wraps a watch channel whose value is `Some(Identity)` while a user is
/// signed in and `None` otherwise. The hosting application drives
/// [`sign_in`](SessionIdentity::sign_in) / [`sign_out`](SessionIdentity::sign_out);
/// the sync layer holds a [`watch::Receiver`] and reacts to edges.
#[derive(Debug)]
pub struct SessionIdentity {
    tx: watch::Sender<Option<Identity>>,
}

impl SessionIdentity {
    /// Creates a signed-out session.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Publishes a sign-in.
    pub fn sign_in(&self, identity: Identity) {
        self.tx.send_replace(Some(identity));
    }

    /// Publishes a sign-out.
    pub fn sign_out(&self) {
        self.tx.send_replace(None);
    }

    /// Returns a receiver observing the session identity.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }

    /// Returns the current identity, if signed in.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.tx.borrow().clone()
    }
}

impl Default for SessionIdentity {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
