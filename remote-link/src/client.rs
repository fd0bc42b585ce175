//! Persistent JSON-RPC link to the remote launch service.
//!
//! ARCHITECTURE
//! ============
//! One [`RemoteLinkClient`] owns at most one live transport. Requests are
//! written straight into the transport's outbound channel after a pending
//! entry is registered. Everything inbound goes through one dispatch task
//! per transport, which classifies each frame and either resolves a pending
//! entry or fans a notification out to subscribers.
//!
//! LIFECYCLE
//! =========
//! `Closed -> Connecting -> Open -> Closing -> Closed`. An unexpected close
//! moves to `Reconnecting { attempt }` and, after `attempt * base_delay`,
//! tries again, up to `max_reconnect_attempts`. A successful open resets the
//! attempt counter. `disconnect` pins the counter at its maximum and voids
//! any scheduled or in-flight reconnect.
//!
//! Connects are serialized behind a gate, and the previous transport is
//! fully shut down before a new one is opened. Two counters make stale work
//! harmless: `session` (bumped by `disconnect`) voids any connect that
//! started earlier, and `round` (bumped by `connect` and `disconnect`) voids
//! scheduled reconnects. Each transport also carries a `generation` so a
//! close event from a retired transport is ignored.
//!
//! ERROR HANDLING
//! ==============
//! Failures are returned to the caller of `connect` or `request` and never
//! surface inside the dispatch task. Malformed frames are logged and
//! dropped. Reconnect failures are logged only; exhausting the attempts
//! leaves the client observably `Closed`. Pending requests fail with
//! `ConnectionLost` the moment the transport drops.

#[path = "client_methods.rs"]
mod client_methods;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use rpc_frames::{Inbound, Notification, NotificationKind, Request};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::LinkConfig;
use crate::endpoint::Endpoint;
use crate::error::LinkError;
use crate::handlers::{HandlerId, HandlerRegistry, NotificationHandler};
use crate::pending::PendingTable;
use crate::transport::{Connector, TransportEvent, TransportHandle, WsConnector};

// =============================================================================
// STATE
// =============================================================================

/// Observable connection state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LinkState {
    #[default]
    Closed,
    Connecting,
    Open,
    Closing,
    /// Waiting out the backoff before automatic reconnect number `attempt`.
    Reconnecting { attempt: u32 },
}

impl LinkState {
    #[must_use]
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => f.write_str("closed"),
            Self::Connecting => f.write_str("connecting"),
            Self::Open => f.write_str("open"),
            Self::Closing => f.write_str("closing"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
        }
    }
}

struct LiveLink {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
    io_task: Option<JoinHandle<()>>,
    dispatch_task: JoinHandle<()>,
}

impl LiveLink {
    /// Close locally and wait, bounded by `grace`, for the socket task to end.
    async fn shutdown(self, grace: Duration) {
        let Self {
            generation,
            outbound,
            io_task,
            dispatch_task,
        } = self;
        dispatch_task.abort();
        drop(outbound);
        debug!(generation, "shutting down transport");
        close_io_task(io_task, grace).await;
    }
}

async fn close_io_task(io_task: Option<JoinHandle<()>>, grace: Duration) {
    let Some(mut task) = io_task else {
        return;
    };
    if timeout(grace, &mut task).await.is_err() {
        warn!("transport did not stop in time; aborting it");
        task.abort();
    }
}

#[derive(Default)]
struct Lifecycle {
    endpoint: Option<Endpoint>,
    link: Option<LiveLink>,
    backoff: Option<JoinHandle<()>>,
    attempt: u32,
    session: u64,
    round: u64,
    generation: u64,
}

/// Snapshot of the counters a connect was started under.
#[derive(Clone, Copy, Debug)]
struct Ticket {
    session: u64,
    /// Set for automatic reconnects, which any newer `connect` also voids.
    round: Option<u64>,
}

impl Ticket {
    fn is_current(self, life: &Lifecycle) -> bool {
        self.session == life.session && self.round.is_none_or(|round| round == life.round)
    }
}

struct Inner {
    config: LinkConfig,
    connector: Arc<dyn Connector>,
    pending: PendingTable,
    handlers: HandlerRegistry,
    state: watch::Sender<LinkState>,
    connect_gate: tokio::sync::Mutex<()>,
    lifecycle: Mutex<Lifecycle>,
}

// =============================================================================
// CLIENT
// =============================================================================

/// Client for the remote launch service. Cheap to clone; clones share one link.
#[derive(Clone)]
pub struct RemoteLinkClient {
    inner: Arc<Inner>,
}

impl fmt::Debug for RemoteLinkClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLinkClient")
            .field("state", &self.state())
            .field("endpoint", &self.endpoint())
            .finish_non_exhaustive()
    }
}

impl RemoteLinkClient {
    /// Client that connects over websockets.
    #[must_use]
    pub fn new(config: LinkConfig) -> Self {
        Self::with_connector(config, Arc::new(WsConnector))
    }

    /// Client over an arbitrary transport.
    #[must_use]
    pub fn with_connector(config: LinkConfig, connector: Arc<dyn Connector>) -> Self {
        let (state, _) = watch::channel(LinkState::Closed);
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                pending: PendingTable::default(),
                handlers: HandlerRegistry::default(),
                state,
                connect_gate: tokio::sync::Mutex::new(()),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }

    /// Open a connection to `endpoint`, replacing any existing one.
    ///
    /// Cancels a scheduled automatic reconnect. Waits for any connect that is
    /// already running, then fully closes the previous transport before the
    /// new one is opened.
    ///
    /// # Errors
    ///
    /// - [`LinkError::ConnectionTimeout`] if the transport is not open within
    ///   the connect timeout
    /// - [`LinkError::TransportError`] if the transport fails before opening
    /// - [`LinkError::Disconnected`] if `disconnect` ran while this was in flight
    pub async fn connect(&self, endpoint: &Endpoint) -> Result<(), LinkError> {
        let ticket = {
            let mut life = self.inner.lifecycle();
            life.round += 1;
            life.endpoint = Some(endpoint.clone());
            if let Some(task) = life.backoff.take() {
                task.abort();
            }
            Ticket {
                session: life.session,
                round: None,
            }
        };
        self.inner.open_link(ticket, endpoint.clone()).await
    }

    /// Close the connection and stop reconnecting. Idempotent.
    ///
    /// Requests still pending fail with [`LinkError::Disconnected`].
    pub async fn disconnect(&self) {
        let (link, backoff) = {
            let mut life = self.inner.lifecycle();
            life.session += 1;
            life.round += 1;
            life.attempt = self.inner.config.max_reconnect_attempts;
            let link = life.link.take();
            if link.is_some() {
                self.inner.set_state(LinkState::Closing);
            }
            (link, life.backoff.take())
        };

        if let Some(task) = backoff {
            task.abort();
            debug!("cancelled scheduled reconnect");
        }
        let failed = self.inner.pending.fail_all(&LinkError::Disconnected);

        if let Some(link) = link {
            let generation = link.generation;
            link.shutdown(self.inner.config.connect_timeout).await;
            info!(generation, failed_requests = failed, "remote link disconnected");
        }
        self.inner.set_state(LinkState::Closed);
    }

    /// Send `method` and wait for its correlated response.
    ///
    /// # Errors
    ///
    /// - [`LinkError::NotConnected`] immediately when no connection is open;
    ///   nothing is sent
    /// - [`LinkError::Remote`] when the response carries an error object, or
    ///   [`LinkError::RemoteRaw`] when that object has some other shape
    /// - [`LinkError::RequestTimeout`] when no response arrives in time; a
    ///   late response is then dropped
    /// - [`LinkError::ConnectionLost`] / [`LinkError::Disconnected`] when the
    ///   connection goes away first
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, LinkError> {
        let id = Uuid::new_v4().to_string();
        let text = rpc_frames::encode(&Request::new(id.as_str(), method, params))?;

        let (outbound, response) = {
            let life = self.inner.lifecycle();
            let Some(link) = life.link.as_ref() else {
                return Err(LinkError::NotConnected);
            };
            (link.outbound.clone(), self.inner.pending.register(&id))
        };

        if outbound.send(text).is_err() {
            self.inner.pending.remove(&id);
            return Err(LinkError::ConnectionLost);
        }
        debug!(%id, method, "request sent");

        match timeout(self.inner.config.request_timeout, response).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(LinkError::ConnectionLost),
            Err(_) => {
                self.inner.pending.remove(&id);
                warn!(%id, method, "request timed out");
                Err(LinkError::RequestTimeout)
            }
        }
    }

    /// Subscribe to every incoming notification.
    pub fn on_notification<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        let handler: NotificationHandler = Arc::new(handler);
        self.inner.handlers.add(handler)
    }

    /// Unsubscribe. Returns `false` if `id` was not registered.
    pub fn remove_handler(&self, id: HandlerId) -> bool {
        self.inner.handlers.remove(id)
    }

    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.inner.handlers.len()
    }

    /// Whether a transport is open and accepting requests.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lifecycle().link.is_some()
    }

    #[must_use]
    pub fn state(&self) -> LinkState {
        *self.inner.state.borrow()
    }

    /// Watch state transitions.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.inner.state.subscribe()
    }

    /// Endpoint of the most recent `connect`.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.inner.lifecycle().endpoint.clone()
    }

    /// Automatic reconnects used since the last successful open.
    #[must_use]
    pub fn reconnect_attempt(&self) -> u32 {
        self.inner.lifecycle().attempt
    }

    /// Requests still waiting for a response.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }
}

// =============================================================================
// CONNECTION MANAGEMENT
// =============================================================================

impl Inner {
    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: LinkState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            debug!(from = %previous, to = %next, "link state");
        }
    }

    async fn open_link(self: &Arc<Self>, ticket: Ticket, endpoint: Endpoint) -> Result<(), LinkError> {
        let _gate = self.connect_gate.lock().await;

        let previous = {
            let mut life = self.lifecycle();
            if !ticket.is_current(&life) {
                return Err(LinkError::Disconnected);
            }
            life.link.take()
        };
        if let Some(previous) = previous {
            let generation = previous.generation;
            self.set_state(LinkState::Closing);
            let failed = self.pending.fail_all(&LinkError::ConnectionLost);
            previous.shutdown(self.config.connect_timeout).await;
            info!(generation, failed_requests = failed, "closed previous link before reconnecting");
        }

        self.set_state(LinkState::Connecting);
        let url = endpoint.ws_url();
        debug!(%url, "opening remote link");

        let handle = match timeout(self.config.connect_timeout, self.connector.open(&url)).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(err)) => {
                self.set_state(LinkState::Closed);
                return Err(err);
            }
            Err(_) => {
                self.set_state(LinkState::Closed);
                return Err(LinkError::ConnectionTimeout);
            }
        };
        let TransportHandle {
            outbound,
            events,
            task,
        } = handle;

        let installed = {
            let mut life = self.lifecycle();
            if ticket.is_current(&life) {
                life.generation += 1;
                life.attempt = 0;
                let generation = life.generation;
                let dispatch_task =
                    tokio::spawn(run_dispatch(Arc::downgrade(self), generation, events));
                life.link = Some(LiveLink {
                    generation,
                    outbound,
                    io_task: task,
                    dispatch_task,
                });
                self.set_state(LinkState::Open);
                Ok(generation)
            } else {
                Err((outbound, task))
            }
        };

        match installed {
            Ok(generation) => {
                info!(%endpoint, generation, "remote link open");
                Ok(())
            }
            Err((outbound, task)) => {
                debug!(%url, "connect voided while opening; closing fresh transport");
                drop(outbound);
                close_io_task(task, self.config.connect_timeout).await;
                self.set_state(LinkState::Closed);
                Err(LinkError::Disconnected)
            }
        }
    }

    fn on_transport_closed(self: &Arc<Self>, generation: u64, reason: Option<String>) {
        let mut life = self.lifecycle();
        if life.link.as_ref().is_none_or(|link| link.generation != generation) {
            debug!(generation, "ignoring close from a retired transport");
            return;
        }
        let link = life.link.take();
        self.set_state(LinkState::Closed);
        let ticket = Ticket {
            session: life.session,
            round: Some(life.round),
        };
        drop(life);
        drop(link);

        let failed = self.pending.fail_all(&LinkError::ConnectionLost);
        warn!(
            generation,
            reason = reason.as_deref().unwrap_or("none"),
            failed_requests = failed,
            "remote link closed unexpectedly"
        );
        self.schedule_reconnect(ticket);
    }

    fn schedule_reconnect(self: &Arc<Self>, ticket: Ticket) {
        let mut life = self.lifecycle();
        if !ticket.is_current(&life) {
            return;
        }
        let Some(endpoint) = life.endpoint.clone() else {
            return;
        };
        if life.attempt >= self.config.max_reconnect_attempts {
            self.set_state(LinkState::Closed);
            drop(life);
            warn!(
                attempts = self.config.max_reconnect_attempts,
                "reconnect attempts exhausted; link stays closed"
            );
            return;
        }

        life.attempt += 1;
        let attempt = life.attempt;
        let delay = self.config.backoff_delay(attempt);
        self.set_state(LinkState::Reconnecting { attempt });
        let task = tokio::spawn(reconnect_after(Arc::downgrade(self), ticket, endpoint, attempt, delay));
        if let Some(stale) = life.backoff.replace(task) {
            stale.abort();
        }
        drop(life);

        info!(attempt, ?delay, "reconnect scheduled");
    }

    fn dispatch_frame(&self, text: &str) {
        match rpc_frames::decode(text) {
            Ok(Inbound::Response(response)) => {
                let id = response.correlation_key();
                let outcome = response.into_result().map_err(LinkError::from);
                if !self.pending.resolve(&id, outcome) {
                    debug!(%id, "dropping response for unknown or expired request");
                }
            }
            Ok(Inbound::Notification(note)) => {
                log_notification(&note);
                self.handlers.dispatch(&note);
            }
            Err(err) => warn!(error = %err, "dropping malformed frame"),
        }
    }
}

fn log_notification(note: &Notification) {
    match note.kind() {
        NotificationKind::Launching => info!(params = ?note.params, "remote is launching"),
        NotificationKind::MediaStarted => info!(params = ?note.params, "media started"),
        NotificationKind::MediaStopped => info!("media stopped"),
        NotificationKind::Other => debug!(method = %note.method, "notification"),
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Consume one transport's events in order until it closes.
async fn run_dispatch(
    owner: Weak<Inner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    let reason = loop {
        let Some(event) = events.recv().await else {
            break None;
        };
        let Some(inner) = owner.upgrade() else {
            return;
        };
        match event {
            TransportEvent::Frame(text) => inner.dispatch_frame(&text),
            TransportEvent::Closed { reason } => break reason,
        }
    };

    if let Some(inner) = owner.upgrade() {
        inner.on_transport_closed(generation, reason);
    }
}

async fn reconnect_after(
    owner: Weak<Inner>,
    ticket: Ticket,
    endpoint: Endpoint,
    attempt: u32,
    delay: Duration,
) {
    tokio::time::sleep(delay).await;
    let Some(inner) = owner.upgrade() else {
        return;
    };
    {
        let mut life = inner.lifecycle();
        if !ticket.is_current(&life) {
            debug!(attempt, "scheduled reconnect voided");
            return;
        }
        life.backoff = None;
    }

    info!(attempt, %endpoint, "reconnecting");
    match inner.open_link(ticket, endpoint).await {
        Ok(()) => info!(attempt, "reconnected"),
        Err(LinkError::Disconnected) => debug!(attempt, "reconnect voided while opening"),
        Err(err) => {
            warn!(attempt, error = %err, "reconnect attempt failed");
            inner.schedule_reconnect(ticket);
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
