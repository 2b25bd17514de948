//! The reconnection controller — single owner of connection state.
//!
//! One spawned task serializes every mutation of the connection state,
//! the backoff counter, and the open handle set, selecting over its
//! inputs:
//!
//! - the session identity watch channel (sign-in / sign-out edges)
//! - the shared inbound change-message channel
//! - the in-flight subscription-set open, when one exists
//! - the backoff sleep, when a retry is scheduled
//! - the periodic health tick
//! - the shutdown signal
//!
//! ```text
//! Disconnected ──identity──▶ Connecting ──open ok──▶ Connected
//!      ▲                      │      ▲                  │
//!      │                 open failed │              health says
//!      │                 (backoff)───┘               stale
//!      │                                                │
//!      └───────────── logout (any state) ◀─── Stale ────┘
//! ```
//!
//! Opens run on a helper task so a logout can abandon them mid-flight;
//! an abandoned open that later succeeds has its handles closed by a
//! detached reaper, never admitted into the state machine.

use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior, Sleep};
use tripstream_core::{DomainEvent, Identity, RawChangeMessage};

use crate::config::RealtimeConfig;
use crate::dispatcher::Dispatcher;
use crate::error::OpenError;
use crate::feed::ChangeFeed;
use crate::health::HealthMonitor;
use crate::manager::{ScopeHandles, SubscriptionManager};
use crate::metrics::RealtimeMetrics;
use crate::notify::{NotificationSink, Severity};
use crate::retry::{BackoffPolicy, BackoffState};
use crate::status::{ConnectionState, StatusCell, StatusSnapshot};

// ---------------------------------------------------------------------------
// ControllerHandle
// ---------------------------------------------------------------------------

/// Handle to a spawned controller task.
pub struct ControllerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    /// Signals shutdown and waits for the controller to finish its
    /// teardown (close subscriptions, publish `Disconnected`).
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(error) = self.task.await {
            tracing::error!(%error, "controller task failed");
        }
    }

    /// Returns `true` once the controller task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl std::fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ReconnectionController
// ---------------------------------------------------------------------------

/// Drives the connection lifecycle for one client session.
///
/// Construct it with the application's collaborators, register
/// callbacks on [`dispatcher`](ReconnectionController::dispatcher),
/// grab a [`status`](ReconnectionController::status) receiver for the
/// live/offline indicator, then [`spawn`](ReconnectionController::spawn).
pub struct ReconnectionController {
    config: RealtimeConfig,
    manager: Arc<SubscriptionManager>,
    dispatcher: Arc<Dispatcher>,
    monitor: Arc<HealthMonitor>,
    status: Arc<StatusCell>,
    sink: Arc<dyn NotificationSink>,
    metrics: Arc<RealtimeMetrics>,
    identity_rx: watch::Receiver<Option<Identity>>,
    events_rx: mpsc::Receiver<RawChangeMessage>,
}

impl ReconnectionController {
    /// Creates a controller wired to the given collaborators.
    #[must_use]
    pub fn new(
        config: RealtimeConfig,
        feed: Arc<dyn ChangeFeed>,
        sink: Arc<dyn NotificationSink>,
        identity_rx: watch::Receiver<Option<Identity>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(config.event_buffer);
        let manager = Arc::new(SubscriptionManager::new(feed, events_tx));
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&sink), &config));

        Self {
            config,
            manager,
            dispatcher,
            monitor: Arc::new(HealthMonitor::new()),
            status: Arc::new(StatusCell::new()),
            sink,
            metrics: Arc::new(RealtimeMetrics::default()),
            identity_rx,
            events_rx,
        }
    }

    /// Returns the dispatcher for callback registration.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Returns a receiver observing connectivity status.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status.subscribe()
    }

    /// Returns the pipeline metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<RealtimeMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spawns the controller task.
    #[must_use]
    pub fn spawn(self) -> ControllerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        ControllerHandle {
            shutdown: shutdown_tx,
            task,
        }
    }

    #[allow(clippy::too_many_lines)] // the select loop reads best in one piece
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let Self {
            config,
            manager,
            dispatcher,
            monitor,
            status,
            sink,
            metrics,
            mut identity_rx,
            mut events_rx,
        } = self;

        let policy = BackoffPolicy::new(config.base_delay, config.max_delay);
        let mut backoff = BackoffState::default();
        let mut state = ConnectionState::Disconnected;
        let mut handles = ScopeHandles::empty();
        let mut pending_open: Option<JoinHandle<Result<ScopeHandles, OpenError>>> = None;
        let mut retry: Option<Pin<Box<Sleep>>> = None;
        let mut reconnecting_notified = false;

        let mut health = interval(config.health_interval);
        health.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // A session may already be active when the controller starts.
        if let Some(identity) = identity_rx.borrow_and_update().clone() {
            transition(
                &mut state,
                ConnectionState::Connecting,
                backoff.attempt(),
                &status,
                &dispatcher,
            );
            pending_open = Some(spawn_open(&manager, &metrics, identity));
        }

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // A dropped handle counts as shutdown.
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                changed = identity_rx.changed() => {
                    // Any identity edge invalidates the current scope
                    // set: tear everything down before reacting.
                    retry = None;
                    if let Some(task) = pending_open.take() {
                        reap_abandoned_open(&manager, task);
                    }
                    manager.close_all(&mut handles).await;
                    backoff.reset();
                    reconnecting_notified = false;

                    if changed.is_err() {
                        // Identity provider dropped: the session is over.
                        transition(
                            &mut state,
                            ConnectionState::Disconnected,
                            0,
                            &status,
                            &dispatcher,
                        );
                        monitor.reset();
                        return;
                    }

                    match identity_rx.borrow_and_update().clone() {
                        Some(identity) => {
                            tracing::info!(user = %identity.id, "session active, connecting");
                            transition(
                                &mut state,
                                ConnectionState::Connecting,
                                backoff.attempt(),
                                &status,
                                &dispatcher,
                            );
                            pending_open = Some(spawn_open(&manager, &metrics, identity));
                        }
                        None => {
                            tracing::info!("session ended, disconnecting");
                            transition(
                                &mut state,
                                ConnectionState::Disconnected,
                                0,
                                &status,
                                &dispatcher,
                            );
                            monitor.reset();
                        }
                    }
                }

                result = async { pending_open.as_mut().expect("guarded by is_some").await },
                    if pending_open.is_some() =>
                {
                    pending_open = None;
                    match result {
                        Ok(Ok(opened)) => {
                            if identity_rx.borrow().is_none() {
                                // Logout won the race; discard the result.
                                let mut late = opened;
                                manager.close_all(&mut late).await;
                                transition(
                                    &mut state,
                                    ConnectionState::Disconnected,
                                    0,
                                    &status,
                                    &dispatcher,
                                );
                                continue;
                            }
                            handles = opened;
                            backoff.reset();
                            monitor.record_observation(Instant::now());
                            transition(
                                &mut state,
                                ConnectionState::Connected,
                                0,
                                &status,
                                &dispatcher,
                            );
                            if reconnecting_notified {
                                sink.emit(
                                    Severity::Success,
                                    "Connection restored",
                                    "Live updates are back.",
                                    config.toast_duration,
                                );
                                reconnecting_notified = false;
                            }
                        }
                        Ok(Err(error)) => {
                            metrics.open_failures.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(%error, "subscription open failed");
                            schedule_retry(
                                &policy,
                                &mut backoff,
                                &mut retry,
                                &mut reconnecting_notified,
                                &sink,
                                &config,
                                &metrics,
                            );
                            transition(
                                &mut state,
                                ConnectionState::Connecting,
                                backoff.attempt(),
                                &status,
                                &dispatcher,
                            );
                        }
                        Err(join_error) => {
                            metrics.open_failures.fetch_add(1, Ordering::Relaxed);
                            tracing::error!(%join_error, "open task failed");
                            schedule_retry(
                                &policy,
                                &mut backoff,
                                &mut retry,
                                &mut reconnecting_notified,
                                &sink,
                                &config,
                                &metrics,
                            );
                            transition(
                                &mut state,
                                ConnectionState::Connecting,
                                backoff.attempt(),
                                &status,
                                &dispatcher,
                            );
                        }
                    }
                }

                () = async { retry.as_mut().expect("guarded by is_some").as_mut().await },
                    if retry.is_some() =>
                {
                    retry = None;
                    match identity_rx.borrow().clone() {
                        Some(identity) => {
                            pending_open = Some(spawn_open(&manager, &metrics, identity));
                        }
                        None => {
                            // Logout normally clears the retry before it
                            // fires; fall back to disconnected.
                            transition(
                                &mut state,
                                ConnectionState::Disconnected,
                                0,
                                &status,
                                &dispatcher,
                            );
                        }
                    }
                }

                message = events_rx.recv() => {
                    let Some(message) = message else {
                        // The manager holds a sender for the lifetime of
                        // the controller; a closed channel means the
                        // pipeline is gone.
                        break;
                    };
                    metrics.messages_observed.fetch_add(1, Ordering::Relaxed);
                    monitor.record_observation(Instant::now());
                    status.record_event(message.ts_ms);

                    match DomainEvent::decode(&message) {
                        Ok(event) => {
                            metrics.events_decoded.fetch_add(1, Ordering::Relaxed);
                            dispatcher.dispatch(&event);
                        }
                        Err(error) => {
                            metrics.decode_failures.fetch_add(1, Ordering::Relaxed);
                            tracing::warn!(
                                table = %message.table,
                                op = %message.op,
                                %error,
                                "dropping undecodable change message"
                            );
                        }
                    }
                }

                _ = health.tick() => {
                    if monitor.is_stale(Instant::now(), config.stale_after, state) {
                        metrics.stale_detections.fetch_add(1, Ordering::Relaxed);
                        tracing::warn!(
                            threshold_ms = config.stale_after.as_millis() as u64,
                            "connection stale, tearing down"
                        );
                        transition(
                            &mut state,
                            ConnectionState::Stale,
                            backoff.attempt(),
                            &status,
                            &dispatcher,
                        );
                        manager.close_all(&mut handles).await;
                        schedule_retry(
                            &policy,
                            &mut backoff,
                            &mut retry,
                            &mut reconnecting_notified,
                            &sink,
                            &config,
                            &metrics,
                        );
                        transition(
                            &mut state,
                            ConnectionState::Connecting,
                            backoff.attempt(),
                            &status,
                            &dispatcher,
                        );
                    }
                }
            }
        }

        // Shutdown: no background work may outlive the session.
        if let Some(task) = pending_open.take() {
            reap_abandoned_open(&manager, task);
        }
        manager.close_all(&mut handles).await;
        monitor.reset();
        transition(
            &mut state,
            ConnectionState::Disconnected,
            0,
            &status,
            &dispatcher,
        );
        tracing::debug!("controller stopped");
    }
}

impl std::fmt::Debug for ReconnectionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconnectionController")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Helpers (controller task only)
// ---------------------------------------------------------------------------

/// Applies a state transition: records it, publishes it, and informs
/// the dispatcher on entries into `Connected` or `Disconnected`.
fn transition(
    state: &mut ConnectionState,
    next: ConnectionState,
    attempt: u32,
    status: &StatusCell,
    dispatcher: &Dispatcher,
) {
    if *state == next {
        // Re-entrant (Connecting retry loops): keep the attempt count
        // fresh for observers without re-announcing the state.
        status.set_state(next, attempt);
        return;
    }
    *state = next;
    status.set_state(next, attempt);
    tracing::debug!(state = %next, attempt, "connection state");
    if matches!(
        next,
        ConnectionState::Connected | ConnectionState::Disconnected
    ) {
        dispatcher.connection_state_changed(next);
    }
}

/// Spawns a subscription-set open on a helper task so logout can
/// abandon it mid-flight.
fn spawn_open(
    manager: &Arc<SubscriptionManager>,
    metrics: &Arc<RealtimeMetrics>,
    identity: Identity,
) -> JoinHandle<Result<ScopeHandles, OpenError>> {
    metrics.open_attempts.fetch_add(1, Ordering::Relaxed);
    let manager = Arc::clone(manager);
    tokio::spawn(async move { manager.open(&identity).await })
}

/// Lets an abandoned open run to completion and closes whatever it
/// managed to open. Its result never reaches the state machine.
fn reap_abandoned_open(
    manager: &Arc<SubscriptionManager>,
    task: JoinHandle<Result<ScopeHandles, OpenError>>,
) {
    let manager = Arc::clone(manager);
    tokio::spawn(async move {
        if let Ok(Ok(mut late)) = task.await {
            tracing::debug!("closing subscriptions from an abandoned open");
            manager.close_all(&mut late).await;
        }
    });
}

/// Arms the backoff sleep for the next reconnect attempt and emits the
/// persistent "reconnecting" notice on the first attempt of an episode.
#[allow(clippy::too_many_arguments)]
fn schedule_retry(
    policy: &BackoffPolicy,
    backoff: &mut BackoffState,
    retry: &mut Option<Pin<Box<Sleep>>>,
    reconnecting_notified: &mut bool,
    sink: &Arc<dyn NotificationSink>,
    config: &RealtimeConfig,
    metrics: &Arc<RealtimeMetrics>,
) {
    let attempt = backoff.advance();
    let delay = policy.jittered_delay(attempt);
    metrics.reconnect_waits.fetch_add(1, Ordering::Relaxed);
    tracing::info!(attempt, delay_ms = delay.as_millis() as u64, "retry scheduled");

    if !*reconnecting_notified {
        sink.emit(
            Severity::Warning,
            "Reconnecting",
            "Live updates interrupted — reconnecting…",
            config.toast_duration,
        );
        *reconnecting_notified = true;
    }

    *retry = Some(Box::pin(tokio::time::sleep(delay)));
}

// ===========================================================================
// Tests
// ===========================================================================
