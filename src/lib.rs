//! Push notifications to users' personal messaging accounts through a single
//! long-lived gateway session.
//!
//! The surrounding application constructs one `NotificationService` at
//! startup, calls `connect()`, hands clones of it to whatever needs to send,
//! and calls `shutdown()` on exit.
//!
//! ```rust,ignore
//! let config = Config::new();
//! Logger::init_logger(&config)?;
//!
//! let notifier = NotificationService::from_config(&config, gateway);
//! notifier.connect();
//!
//! notifier.send_notification("+1555000111", "Registration confirmed").await;
//!
//! notifier.shutdown().await;
//! ```

use std::sync::Arc;

use log::*;

pub use events::{EventHandler, SessionEvent, Subscription};
pub use service::{Config, Logger};
pub use session::{
    CredentialStore, DeliveryReport, FileCredentialStore, Gateway, LogPairingEmitter,
    PairingChallengeEmitter, SessionCoordinator, SessionState, Settings,
};

use session::SendGateway;

/// Application-facing handle to the notification session.
#[derive(Clone)]
pub struct NotificationService {
    coordinator: SessionCoordinator,
    sender: SendGateway,
}

impl NotificationService {
    /// Must be called from within a Tokio runtime.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        store: Arc<dyn CredentialStore>,
        emitter: Arc<dyn PairingChallengeEmitter>,
        settings: Settings,
    ) -> Self {
        let coordinator = SessionCoordinator::new(gateway, store, emitter, settings);
        let sender = coordinator.send_gateway();
        Self {
            coordinator,
            sender,
        }
    }

    /// Credentials in the configured JSON file, pairing codes in the log.
    pub fn from_config(config: &Config, gateway: Arc<dyn Gateway>) -> Self {
        info!(
            "Gateway credentials stored at {}",
            config.credentials_path().display()
        );
        Self::new(
            gateway,
            Arc::new(FileCredentialStore::new(config.credentials_path())),
            Arc::new(LogPairingEmitter),
            Settings::from(config),
        )
    }

    /// Start or ensure establishing the session. Returns immediately.
    pub fn connect(&self) {
        self.coordinator.connect();
    }

    pub fn is_ready(&self) -> bool {
        self.coordinator.is_ready()
    }

    /// Send one text notification. `false` covers every failure, including
    /// the session not becoming ready within the configured timeout.
    pub async fn send_notification(&self, recipient_id: &str, text: &str) -> bool {
        self.sender.send(recipient_id, text).await
    }

    /// Send a batch of notifications in order; failures do not stop it.
    pub async fn send_notifications<'a, I>(&self, messages: I) -> DeliveryReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.sender.send_batch(messages).await
    }

    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Subscription {
        self.coordinator.subscribe(handler)
    }

    /// Read-only view of the session for status reporting.
    pub fn session(&self) -> &SessionCoordinator {
        &self.coordinator
    }

    pub async fn shutdown(&self) {
        self.coordinator.shutdown().await;
    }
}
