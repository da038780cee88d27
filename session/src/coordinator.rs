//! Session lifecycle coordinator.
//!
//! Owns the single gateway session: drives connect and reconnect, consumes
//! the gateway's event stream through one dispatch function, forwards
//! pairing challenges, coalesces credential updates and opens or rejects the
//! readiness gate.
//!
//! ```text
//! Idle --connect()--> Connecting --open event--> Open
//! Connecting/Open --closed(transient)--> Closed --after delay--> Connecting
//! Connecting/Open --closed(terminal)--> Idle (manual re-pairing required)
//! ```

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use events::{EventHandler, EventPublisher, SessionEvent, Subscription};
use log::*;
use tokio::task::JoinHandle;

use crate::credentials::{CredentialSnapshot, CredentialStore, CredentialWriter};
use crate::error::{connection_error, Error, ErrorKind};
use crate::gateway::{ConnectionUpdate, EventStream, Gateway, GatewayEvent};
use crate::pairing::PairingChallengeEmitter;
use crate::readiness::ReadinessGate;
use crate::reconnect::ReconnectPolicy;
use crate::send::SendGateway;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    /// Transient drop waiting for the scheduled reconnect.
    Closed { reason: String, terminal: bool },
}

struct Session {
    state: SessionState,
    last_error: Option<Arc<Error>>,
    reconnect_attempts: u32,
}

struct Inner {
    gateway: Arc<dyn Gateway>,
    store: Arc<dyn CredentialStore>,
    emitter: Arc<dyn PairingChallengeEmitter>,
    writer: CredentialWriter,
    gate: ReadinessGate,
    reconnect: ReconnectPolicy,
    publisher: EventPublisher,
    settings: Settings,
    /// Set while a connect attempt is in flight.
    connect_guard: AtomicBool,
    shut_down: AtomicBool,
    session: Mutex<Session>,
    attempt: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attempt(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.attempt.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle to the gateway session. Cheap to clone; every clone drives the
/// same session.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    /// Build a coordinator in the `Idle` state. Must be called from within a
    /// Tokio runtime; the credential writer task starts immediately.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn CredentialStore>,
        emitter: Arc<dyn PairingChallengeEmitter>,
        settings: Settings,
    ) -> Self {
        let writer = CredentialWriter::spawn(Arc::clone(&store), settings.credential_debounce);

        Self {
            inner: Arc::new(Inner {
                gateway,
                store,
                emitter,
                writer,
                gate: ReadinessGate::new(),
                reconnect: ReconnectPolicy::new(settings.reconnect_delay),
                publisher: EventPublisher::new(),
                settings,
                connect_guard: AtomicBool::new(false),
                shut_down: AtomicBool::new(false),
                session: Mutex::new(Session {
                    state: SessionState::Idle,
                    last_error: None,
                    reconnect_attempts: 0,
                }),
                attempt: Mutex::new(None),
            }),
        }
    }

    /// Start establishing the session. Returns immediately; the outcome is
    /// observed through `is_ready`, `state` and lifecycle events.
    ///
    /// No-op while an attempt is in flight, while the session is open, and
    /// after `shutdown`.
    pub fn connect(&self) {
        if self.is_shut_down() {
            debug!("Session is shut down, ignoring connect");
            return;
        }
        if self
            .inner
            .connect_guard
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Connect attempt already in flight, ignoring connect");
            return;
        }

        let attempt = {
            let mut session = self.inner.session();
            // The open handler sets `Open` before clearing the guard, so this
            // check cannot miss a session that just opened.
            if session.state == SessionState::Open {
                drop(session);
                self.release_guard();
                debug!("Session already open, ignoring connect");
                return;
            }
            session.state = SessionState::Connecting;
            session.reconnect_attempts
        };

        info!("Connecting to messaging gateway (reconnect attempt {attempt})");
        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.run_attempt(attempt).await });
        *self.inner.attempt() = Some(handle);

        // Lost a race with shutdown.
        if self.is_shut_down() {
            if let Some(handle) = self.inner.attempt().take() {
                handle.abort();
            }
        }
    }

    /// Non-blocking snapshot of whether the session is open.
    pub fn is_ready(&self) -> bool {
        self.inner.gate.is_ready()
    }

    pub fn state(&self) -> SessionState {
        self.inner.session().state.clone()
    }

    /// Most recent connection failure; cleared when the session opens.
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.inner.session().last_error.clone()
    }

    /// Transient closes since the session was last open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.session().reconnect_attempts
    }

    /// Whether a connect attempt is in flight.
    pub fn is_connecting(&self) -> bool {
        self.inner.connect_guard.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Read-only handle to the readiness gate.
    pub fn readiness(&self) -> ReadinessGate {
        self.inner.gate.clone()
    }

    /// A sender that waits on this session's readiness gate.
    pub fn send_gateway(&self) -> SendGateway {
        SendGateway::new(
            self.readiness(),
            Arc::clone(&self.inner.gateway),
            self.inner.settings.ready_timeout,
        )
    }

    /// Observe lifecycle events for as long as the subscription is held.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Subscription {
        self.inner.publisher.subscribe(handler)
    }

    /// Tear the session down: cancel the pending reconnect, stop consuming
    /// gateway events, reject every waiter with `Shutdown` and stop the
    /// credential writer according to the configured flush policy.
    pub async fn shutdown(&self) {
        if self.inner.shut_down.swap(true, Ordering::AcqRel) {
            debug!("Session already shut down");
            return;
        }
        info!("Shutting down gateway session");

        if self.inner.reconnect.cancel() {
            debug!("Cancelled pending reconnect");
        }
        if let Some(attempt) = self.inner.attempt().take() {
            attempt.abort();
        }
        self.inner.session().state = SessionState::Idle;
        self.release_guard();

        let rejected = self.inner.gate.shutdown();
        if rejected > 0 {
            info!("Rejected {rejected} waiting sender(s) at shutdown");
        }

        self.inner
            .writer
            .shutdown(self.inner.settings.shutdown_flush)
            .await;
        self.inner.publisher.publish(SessionEvent::ShutDown).await;
    }

    fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::Acquire)
    }

    fn release_guard(&self) {
        self.inner.connect_guard.store(false, Ordering::Release);
    }

    async fn run_attempt(self, attempt: u32) {
        self.inner
            .publisher
            .publish(SessionEvent::Connecting { attempt })
            .await;

        let mut events = match self.open_session().await {
            Ok(events) => events,
            Err(err) => {
                warn!("Failed to open gateway session: {err}");
                self.handle_close(err.to_string(), false, err).await;
                return;
            }
        };

        while let Some(event) = events.recv().await {
            if self.dispatch(event).await.is_break() {
                return;
            }
        }

        if !self.is_shut_down() {
            let reason = "gateway event stream ended";
            self.handle_close(reason.to_string(), false, connection_error(false, reason))
                .await;
        }
    }

    async fn open_session(&self) -> Result<EventStream, Error> {
        let credentials = self.inner.store.load().await?.unwrap_or_else(|| {
            info!("No stored credentials, the gateway will issue a pairing challenge");
            CredentialSnapshot::empty()
        });
        self.inner.gateway.open(credentials).await
    }

    /// Single entry point for gateway events. Breaks when the session closed
    /// and its stream should no longer be read.
    async fn dispatch(&self, event: GatewayEvent) -> ControlFlow<()> {
        match event {
            GatewayEvent::PairingCode(code) => {
                self.inner.emitter.display(&code);
                self.inner
                    .publisher
                    .publish(SessionEvent::PairingCodeIssued)
                    .await;
            }
            GatewayEvent::CredentialUpdate(snapshot) => {
                trace!("Received credential snapshot v{}", snapshot.version);
                self.inner.writer.submit(snapshot);
            }
            GatewayEvent::StateChange(ConnectionUpdate::Open) => {
                self.handle_open().await;
            }
            GatewayEvent::StateChange(ConnectionUpdate::Closed { reason, terminal }) => {
                let error = connection_error(terminal, &reason);
                self.handle_close(reason, terminal, error).await;
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_open(&self) {
        let released = {
            let mut session = self.inner.session();
            if session.state != SessionState::Connecting {
                warn!("Ignoring open event while {:?}", session.state);
                return;
            }
            session.state = SessionState::Open;
            session.last_error = None;
            session.reconnect_attempts = 0;
            self.inner.gate.mark_open()
        };
        self.release_guard();

        info!("Gateway session open, released {released} waiting sender(s)");
        self.inner.publisher.publish(SessionEvent::Opened).await;
    }

    async fn handle_close(&self, reason: String, terminal: bool, error: Error) {
        let (attempts, rejected) = {
            let mut session = self.inner.session();
            session.last_error = Some(Arc::new(error));
            if terminal {
                session.state = SessionState::Idle;
                (
                    session.reconnect_attempts,
                    self.inner.gate.reject_all(ErrorKind::TerminalAuth),
                )
            } else {
                session.state = SessionState::Closed {
                    reason: reason.clone(),
                    terminal: false,
                };
                session.reconnect_attempts = session.reconnect_attempts.saturating_add(1);
                self.inner.gate.mark_not_ready();
                (session.reconnect_attempts, 0)
            }
        };
        self.release_guard();

        if terminal {
            self.inner.reconnect.cancel();
            error!(
                "Gateway session closed permanently ({reason}), re-pairing required. \
                 Rejected {rejected} waiting sender(s)"
            );
        } else if !self.is_shut_down() {
            warn!(
                "Gateway session closed ({reason}), reconnecting in {:?} (attempt {attempts})",
                self.inner.reconnect.delay()
            );
            self.schedule_reconnect();
        }

        self.inner
            .publisher
            .publish(SessionEvent::Closed { reason, terminal })
            .await;
    }

    fn schedule_reconnect(&self) {
        let inner = Arc::downgrade(&self.inner);
        self.inner.reconnect.schedule(async move {
            if let Some(inner) = inner.upgrade() {
                SessionCoordinator { inner }.connect();
            }
        });
    }
}
