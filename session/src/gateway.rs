//! The external messaging gateway, seen from the session core.
//!
//! The wire protocol and its cryptography live behind the `Gateway` trait;
//! the coordinator only consumes the typed event stream an open session
//! produces.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::credentials::CredentialSnapshot;
use crate::error::Error;
use crate::recipient::RecipientId;

/// Connection-level changes reported by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUpdate {
    /// The session is authenticated and can carry messages.
    Open,
    /// The session dropped. `terminal` is set for logouts and revoked
    /// credentials, which must not be retried automatically.
    Closed { reason: String, terminal: bool },
}

/// Closed set of events an open gateway session emits.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// One-time pairing challenge for binding the session to an account.
    PairingCode(String),
    StateChange(ConnectionUpdate),
    /// Rotated credential material that should be persisted.
    CredentialUpdate(CredentialSnapshot),
}

/// Events of one gateway session. The stream ending counts as a drop.
pub type EventStream = mpsc::Receiver<GatewayEvent>;

/// Result of asking the gateway whether a recipient has an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecipientLookup {
    pub exists: bool,
}

/// Abstraction over the messaging gateway client.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Start a session with the given credentials. Returns as soon as the
    /// session exists; its handshake is reported through the event stream.
    async fn open(&self, credentials: CredentialSnapshot) -> Result<EventStream, Error>;

    /// Check whether the recipient is registered with the gateway.
    async fn lookup_recipient(&self, recipient: &RecipientId) -> Result<RecipientLookup, Error>;

    /// Deliver a text message. One attempt, no retries.
    async fn send_message(&self, recipient: &RecipientId, payload: &str) -> Result<(), Error>;
}
