//! Subscription set management.
//!
//! The manager turns an identity into the set of open feed
//! subscriptions its role requires. Opens are all-or-nothing: a failure
//! on any scope closes whatever already succeeded before the error is
//! returned, so the controller never has to reason about partial sets.

use std::sync::Arc;

use tokio::sync::mpsc;
use tripstream_core::{Identity, RawChangeMessage};

use crate::error::OpenError;
use crate::feed::{ChangeFeed, FeedHandle};
use crate::scope::scopes_for;

// ---------------------------------------------------------------------------
// ScopeHandles
// ---------------------------------------------------------------------------

/// The handles of one successfully opened subscription set.
///
/// Owned exclusively by the reconnection controller between open and
/// close. A drained set is empty; closing it again is a no-op.
#[derive(Debug, Default)]
pub struct ScopeHandles {
    handles: Vec<FeedHandle>,
}

impl ScopeHandles {
    /// Returns an empty handle set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the number of open handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if no handles are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Returns the scope names of the held handles.
    #[must_use]
    pub fn scope_names(&self) -> Vec<&str> {
        self.handles.iter().map(FeedHandle::scope_name).collect()
    }
}

// ---------------------------------------------------------------------------
// SubscriptionManager
// ---------------------------------------------------------------------------

/// Opens and closes the subscription set an identity requires.
///
/// Every subscription delivers into the one shared event channel; the
/// controller drains it and feeds the decoder/dispatcher pipeline.
pub struct SubscriptionManager {
    feed: Arc<dyn ChangeFeed>,
    events_tx: mpsc::Sender<RawChangeMessage>,
}

impl SubscriptionManager {
    /// Creates a manager delivering into `events_tx`.
    #[must_use]
    pub fn new(feed: Arc<dyn ChangeFeed>, events_tx: mpsc::Sender<RawChangeMessage>) -> Self {
        Self { feed, events_tx }
    }

    /// Opens every scope the identity requires.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError`] naming the first scope that failed; any
    /// scope opened before it has already been closed again — on error,
    /// zero scopes remain active.
    pub async fn open(&self, identity: &Identity) -> Result<ScopeHandles, OpenError> {
        let scopes = scopes_for(identity);
        let mut opened = ScopeHandles::empty();

        for scope in &scopes {
            match self.feed.subscribe(scope, self.events_tx.clone()).await {
                Ok(handle) => {
                    tracing::debug!(scope = %scope, "scope open");
                    opened.handles.push(handle);
                }
                Err(source) => {
                    tracing::warn!(scope = %scope, error = %source, "scope failed to open");
                    self.close_all(&mut opened).await;
                    return Err(OpenError {
                        scope: scope.name().to_string(),
                        source,
                    });
                }
            }
        }

        tracing::info!(
            user = %identity.id,
            role = %identity.role,
            scopes = opened.len(),
            "subscription set open"
        );
        Ok(opened)
    }

    /// Closes every handle in the set.
    ///
    /// Idempotent: the set is drained as it is closed, so a second call
    /// finds nothing to do. Transport errors are logged, never
    /// propagated.
    pub async fn close_all(&self, handles: &mut ScopeHandles) {
        for handle in handles.handles.drain(..) {
            if let Err(error) = self.feed.unsubscribe(&handle).await {
                tracing::warn!(%handle, %error, "unsubscribe failed");
            } else {
                tracing::debug!(%handle, "scope closed");
            }
        }
    }
}

impl std::fmt::Debug for SubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionManager").finish_non_exhaustive()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tripstream_core::Role;

    use crate::testing::MockFeed;

    fn make_manager(feed: &Arc<MockFeed>) -> SubscriptionManager {
        let (tx, _rx) = mpsc::channel(16);
        SubscriptionManager::new(Arc::clone(feed) as Arc<dyn ChangeFeed>, tx)
    }

    #[tokio::test]
    async fn opens_every_required_scope() {
        let feed = Arc::new(MockFeed::default());
        let manager = make_manager(&feed);

        let handles = manager
            .open(&Identity::new("u1", Role::BasicAdmin))
            .await
            .unwrap();

        assert_eq!(handles.len(), 3);
        assert_eq!(feed.active_count(), 3);
    }

    #[tokio::test]
    async fn open_is_all_or_nothing() {
        let feed = Arc::new(MockFeed::default());
        // The admin scope opens last; failing it must roll back the two
        // personal scopes that already succeeded.
        feed.fail_scope("bookings-all");
        let manager = make_manager(&feed);

        let err = manager
            .open(&Identity::new("a1", Role::SuperAdmin))
            .await
            .unwrap_err();

        assert_eq!(err.scope, "bookings-all");
        assert_eq!(feed.active_count(), 0);
        assert_eq!(feed.unsubscribe_count(), 2);
    }

    #[tokio::test]
    async fn close_all_is_idempotent() {
        let feed = Arc::new(MockFeed::default());
        let manager = make_manager(&feed);

        let mut handles = manager
            .open(&Identity::new("u1", Role::Agent))
            .await
            .unwrap();
        assert_eq!(handles.len(), 2);

        manager.close_all(&mut handles).await;
        assert!(handles.is_empty());
        assert_eq!(feed.unsubscribe_count(), 2);

        // Second close: no error, no duplicate unsubscribes.
        manager.close_all(&mut handles).await;
        assert_eq!(feed.unsubscribe_count(), 2);
    }

    #[tokio::test]
    async fn closing_an_empty_set_is_a_noop() {
        let feed = Arc::new(MockFeed::default());
        let manager = make_manager(&feed);
        let mut handles = ScopeHandles::empty();
        manager.close_all(&mut handles).await;
        assert_eq!(feed.unsubscribe_count(), 0);
    }

    #[tokio::test]
    async fn unsubscribe_errors_are_swallowed() {
        let feed = Arc::new(MockFeed::default());
        let manager = make_manager(&feed);

        let mut handles = manager
            .open(&Identity::new("u1", Role::Agent))
            .await
            .unwrap();

        feed.fail_unsubscribes(true);
        manager.close_all(&mut handles).await;
        assert!(handles.is_empty());
    }
}
