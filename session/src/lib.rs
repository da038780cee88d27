//! Session lifecycle core for the messaging gateway connection.
//!
//! One long-lived gateway session is shared by every sender in the process.
//! This crate keeps it alive and makes it safe to use:
//!
//! - **SessionCoordinator**: owns the state machine, drives connect and
//!   fixed-delay reconnect, forwards pairing challenges
//! - **ReadinessGate**: senders wait here, with a deadline, until the session
//!   is authenticated and open
//! - **ReconnectPolicy**: one pending reconnect at a time, routed through the
//!   same guarded `connect()` as the first attempt
//! - **CredentialWriter**: coalesces rotating credential updates into one
//!   trailing save
//! - **SendGateway**: validates the recipient and makes one delivery attempt,
//!   reporting the outcome as a plain `bool`
//!
//! The gateway wire protocol, credential storage backend and pairing-code
//! presentation are collaborators behind the `Gateway`, `CredentialStore`
//! and `PairingChallengeEmitter` traits.
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = SessionCoordinator::new(
//!     gateway,
//!     Arc::new(FileCredentialStore::new(config.credentials_path())),
//!     Arc::new(LogPairingEmitter),
//!     Settings::from(&config),
//! );
//! coordinator.connect();
//!
//! let sender = coordinator.send_gateway();
//! if !sender.send("+1555000111", "Your event starts in 1 hour").await {
//!     // logged already; nothing else to do
//! }
//! ```

pub mod coordinator;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod pairing;
pub mod readiness;
pub mod recipient;
pub mod reconnect;
pub mod send;
pub mod settings;

#[cfg(test)]
mod test_support;

pub use coordinator::{SessionCoordinator, SessionState};
pub use credentials::{
    CredentialSnapshot, CredentialStore, CredentialWriter, FileCredentialStore, FlushPolicy,
};
pub use error::{Error, ErrorKind};
pub use gateway::{ConnectionUpdate, EventStream, Gateway, GatewayEvent, RecipientLookup};
pub use pairing::{LogPairingEmitter, PairingChallengeEmitter};
pub use readiness::ReadinessGate;
pub use recipient::RecipientId;
pub use reconnect::ReconnectPolicy;
pub use send::{DeliveryReport, SendGateway};
pub use settings::Settings;
