//! In-memory collaborators shared by the crate's unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time;

use crate::credentials::{CredentialSnapshot, CredentialStore};
use crate::error::{gateway_error, persistence_error, Error};
use crate::gateway::{EventStream, Gateway, GatewayEvent, RecipientLookup};
use crate::recipient::RecipientId;

pub(crate) fn snapshot(version: u64) -> CredentialSnapshot {
    CredentialSnapshot::new(version, json!({ "registration_id": version }))
}

/// Lets spawned tasks run; under a paused clock no simulated time passes
/// until every task is idle.
pub(crate) async fn settle() {
    time::sleep(Duration::from_millis(1)).await;
}

/// Credential store that remembers every save.
#[derive(Default)]
pub(crate) struct RecordingStore {
    stored: Mutex<Option<CredentialSnapshot>>,
    saved: Mutex<Vec<CredentialSnapshot>>,
    failing_loads: AtomicUsize,
}

impl RecordingStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_snapshot(snapshot: CredentialSnapshot) -> Self {
        let store = Self::default();
        *store.stored.lock().unwrap() = Some(snapshot);
        store
    }

    pub(crate) fn fail_next_loads(&self, count: usize) {
        self.failing_loads.store(count, Ordering::SeqCst);
    }

    pub(crate) fn saved(&self) -> Vec<CredentialSnapshot> {
        self.saved.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialStore for RecordingStore {
    async fn load(&self) -> Result<Option<CredentialSnapshot>, Error> {
        let remaining = self.failing_loads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_loads.store(remaining - 1, Ordering::SeqCst);
            return Err(persistence_error("store unavailable"));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn save(&self, snapshot: CredentialSnapshot) -> Result<(), Error> {
        self.saved.lock().unwrap().push(snapshot.clone());
        *self.stored.lock().unwrap() = Some(snapshot);
        Ok(())
    }
}

/// Scriptable gateway: tests push events into the most recently opened
/// session with `emit`.
#[derive(Default)]
pub(crate) struct FakeGateway {
    opened_with: Mutex<Vec<CredentialSnapshot>>,
    stream: Mutex<Option<mpsc::Sender<GatewayEvent>>>,
    failing_opens: AtomicUsize,
    registered: Mutex<HashSet<String>>,
    lookups: Mutex<Vec<String>>,
    sent: Mutex<Vec<(String, String)>>,
    fail_sends: AtomicBool,
}

impl FakeGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_recipients(recipients: &[&str]) -> Self {
        let gateway = Self::default();
        gateway
            .registered
            .lock()
            .unwrap()
            .extend(recipients.iter().map(|r| r.to_string()));
        gateway
    }

    pub(crate) fn opens(&self) -> usize {
        self.opened_with.lock().unwrap().len()
    }

    pub(crate) fn opened_with(&self) -> Vec<CredentialSnapshot> {
        self.opened_with.lock().unwrap().clone()
    }

    pub(crate) fn fail_next_opens(&self, count: usize) {
        self.failing_opens.store(count, Ordering::SeqCst);
    }

    pub(crate) fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }

    pub(crate) fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub(crate) fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) async fn emit(&self, event: GatewayEvent) {
        let sender = self.stream.lock().unwrap().clone();
        if let Some(sender) = sender {
            let _ = sender.send(event).await;
        }
        settle().await;
    }

    /// Drop the session's sending side without a close event.
    pub(crate) async fn end_stream(&self) {
        self.stream.lock().unwrap().take();
        settle().await;
    }
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn open(&self, credentials: CredentialSnapshot) -> Result<EventStream, Error> {
        self.opened_with.lock().unwrap().push(credentials);

        let remaining = self.failing_opens.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_opens.store(remaining - 1, Ordering::SeqCst);
            return Err(gateway_error("handshake refused"));
        }

        let (sender, receiver) = mpsc::channel(64);
        *self.stream.lock().unwrap() = Some(sender);
        Ok(receiver)
    }

    async fn lookup_recipient(&self, recipient: &RecipientId) -> Result<RecipientLookup, Error> {
        self.lookups.lock().unwrap().push(recipient.to_string());
        let exists = self.registered.lock().unwrap().contains(recipient.as_str());
        Ok(RecipientLookup { exists })
    }

    async fn send_message(&self, recipient: &RecipientId, payload: &str) -> Result<(), Error> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(gateway_error("message rejected"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), payload.to_string()));
        Ok(())
    }
}
