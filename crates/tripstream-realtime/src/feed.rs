//! The change-feed collaborator trait.
//!
//! The subsystem never assumes a concrete transport. It requires only
//! that subscribing can fail distinguishably from a delivered-but-empty
//! stream, and that an open subscription pushes [`RawChangeMessage`]s
//! into the channel it was given.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tripstream_core::RawChangeMessage;

use crate::error::FeedError;
use crate::scope::SubscriptionScope;

/// Opaque handle to one open scope subscription.
///
/// Owned exclusively by the subscription set manager from successful
/// open until close; implementations key their internal state on
/// [`FeedHandle::id`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedHandle {
    id: u64,
    scope: String,
}

impl FeedHandle {
    /// Creates a handle. Called by transport implementations only.
    #[must_use]
    pub fn new(id: u64, scope: impl Into<String>) -> Self {
        Self {
            id,
            scope: scope.into(),
        }
    }

    /// Returns the transport-assigned subscription id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the name of the scope this handle belongs to.
    #[must_use]
    pub fn scope_name(&self) -> &str {
        &self.scope
    }
}

impl fmt::Display for FeedHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scope, self.id)
    }
}

/// A server-pushed change feed.
///
/// Implementations wrap whatever transport the deployment uses; the
/// sync subsystem drives them through this trait only.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Opens a subscription for one scope.
    ///
    /// On success the transport delivers every matching change into
    /// `events` until [`unsubscribe`](ChangeFeed::unsubscribe) is called
    /// or the connection dies.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the subscription could not be
    /// established; an established-but-quiet subscription is success.
    async fn subscribe(
        &self,
        scope: &SubscriptionScope,
        events: mpsc::Sender<RawChangeMessage>,
    ) -> Result<FeedHandle, FeedError>;

    /// Closes a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the transport could not tear the
    /// subscription down; callers log and move on.
    async fn unsubscribe(&self, handle: &FeedHandle) -> Result<(), FeedError>;
}
