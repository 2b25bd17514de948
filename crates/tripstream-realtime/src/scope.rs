//! Subscription scopes and their derivation from identity.
//!
//! A scope is a named logical feed: a table plus a server-side filter
//! predicate. The scope set is a deterministic function of the signed-in
//! identity's role — every role gets the two personal scopes, admins
//! additionally get the unfiltered all-bookings scope. The controller
//! relies on this determinism to guarantee the active set always exactly
//! matches what the current identity requires.

use std::fmt;

use tripstream_core::{Identity, Table};

/// A named logical feed with its server-side filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionScope {
    name: String,
    table: Table,
    filter: String,
}

impl SubscriptionScope {
    /// The signed-in agent's own bookings.
    #[must_use]
    pub fn personal_bookings(identity: &Identity) -> Self {
        Self {
            name: format!("bookings-agent-{}", identity.id),
            table: Table::Bookings,
            filter: format!("agent_id=eq.{}", identity.id),
        }
    }

    /// Notifications addressed to the signed-in user.
    #[must_use]
    pub fn personal_notifications(identity: &Identity) -> Self {
        Self {
            name: format!("notifications-user-{}", identity.id),
            table: Table::Notifications,
            filter: format!("user_id=eq.{}", identity.id),
        }
    }

    /// Every booking, unfiltered. Admin roles only.
    #[must_use]
    pub fn all_bookings() -> Self {
        Self {
            name: "bookings-all".into(),
            table: Table::Bookings,
            filter: String::new(),
        }
    }

    /// Returns the scope's unique name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table this scope replicates.
    #[must_use]
    pub fn table(&self) -> Table {
        self.table
    }

    /// Returns the server-side filter predicate; empty means unfiltered.
    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

impl fmt::Display for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Computes the scope set the given identity requires.
#[must_use]
pub fn scopes_for(identity: &Identity) -> Vec<SubscriptionScope> {
    let mut scopes = vec![
        SubscriptionScope::personal_bookings(identity),
        SubscriptionScope::personal_notifications(identity),
    ];
    if identity.role.sees_all_bookings() {
        scopes.push(SubscriptionScope::all_bookings());
    }
    scopes
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tripstream_core::Role;

    #[test]
    fn agent_gets_exactly_the_personal_scopes() {
        let scopes = scopes_for(&Identity::new("u1", Role::Agent));
        let names: Vec<&str> = scopes.iter().map(SubscriptionScope::name).collect();
        assert_eq!(names, vec!["bookings-agent-u1", "notifications-user-u1"]);
    }

    #[test]
    fn admins_additionally_get_all_bookings() {
        for role in [Role::BasicAdmin, Role::SuperAdmin] {
            let scopes = scopes_for(&Identity::new("a1", role));
            assert_eq!(scopes.len(), 3);
            assert_eq!(scopes[2].name(), "bookings-all");
            assert_eq!(scopes[2].filter(), "");
        }
    }

    #[test]
    fn derivation_is_deterministic() {
        let identity = Identity::new("u7", Role::BasicAdmin);
        assert_eq!(scopes_for(&identity), scopes_for(&identity));
    }

    #[test]
    fn personal_scopes_filter_on_the_identity() {
        let identity = Identity::new("u3", Role::Agent);
        let bookings = SubscriptionScope::personal_bookings(&identity);
        assert_eq!(bookings.table(), Table::Bookings);
        assert_eq!(bookings.filter(), "agent_id=eq.u3");

        let notifications = SubscriptionScope::personal_notifications(&identity);
        assert_eq!(notifications.table(), Table::Notifications);
        assert_eq!(notifications.filter(), "user_id=eq.u3");
    }
}
