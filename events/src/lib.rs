//! Lifecycle event infrastructure for the messaging gateway session.
//!
//! This crate lets the rest of the application observe the session without
//! reaching into its state.
//!
//! # Architecture
//!
//! - **SessionEvent**: Enum of every lifecycle change the session publishes
//! - **EventHandler**: Trait for implementing observers
//! - **EventPublisher**: Fans events out to the currently registered handlers
//! - **Subscription**: Handle returned on registration; dropping it (or calling
//!   `cancel`) removes the handler so observers never leak
//!
//! This crate has no dependencies on internal crates, so both the session core
//! and the application facade can depend on it.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use uuid::Uuid;

/// Lifecycle events published by the session coordinator.
///
/// Events are notifications only. Credential material and pairing codes are
/// never carried in them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connect attempt has started. `attempt` is the number of transient
    /// closes seen since the session was last open (0 for a first connect).
    Connecting { attempt: u32 },
    /// The gateway authenticated the session; senders may proceed.
    Opened,
    /// The gateway issued a pairing challenge that was handed to the emitter.
    PairingCodeIssued,
    /// The session closed. `terminal` closes are not retried automatically.
    Closed { reason: String, terminal: bool },
    /// The session was torn down by its owner.
    ShutDown,
}

/// Trait for handling session events.
/// Implementations should return quickly; handlers run sequentially on the
/// session's event path.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &SessionEvent);
}

/// Unique identifier for a registered handler (publisher-generated).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type HandlerMap = DashMap<SubscriptionId, Arc<dyn EventHandler>>;

/// Publishes session events to registered handlers.
#[derive(Clone, Default)]
pub struct EventPublisher {
    handlers: Arc<HandlerMap>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. The handler stays registered for as long as the
    /// returned `Subscription` is alive.
    #[must_use = "dropping the subscription immediately unregisters the handler"]
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> Subscription {
        let id = SubscriptionId::new();
        self.handlers.insert(id.clone(), handler);

        Subscription {
            id,
            handlers: Arc::downgrade(&self.handlers),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers, one after another.
    pub async fn publish(&self, event: SessionEvent) {
        // Snapshot first so no map shard is held across an await point.
        let handlers: Vec<Arc<dyn EventHandler>> = self
            .handlers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for handler in handlers {
            handler.handle(&event).await;
        }
    }
}

/// Registration handle for an `EventHandler`.
pub struct Subscription {
    id: SubscriptionId,
    handlers: Weak<HandlerMap>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Explicitly unregister the handler.
    pub fn cancel(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.remove(&self.id);
        }
    }
}
