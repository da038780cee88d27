use std::sync::Arc;
use std::time::Duration;

use log::*;

use crate::gateway::Gateway;
use crate::readiness::ReadinessGate;
use crate::recipient::RecipientId;

/// Outcome of a batch of sends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Delivers notification messages once the session is ready.
///
/// Every failure (not ready in time, logged out, unknown recipient, gateway
/// error) is logged and reported as `false`, so callers never need an error
/// path around delivery. Each call makes at most one delivery attempt.
#[derive(Clone)]
pub struct SendGateway {
    gate: ReadinessGate,
    gateway: Arc<dyn Gateway>,
    ready_timeout: Duration,
}

impl SendGateway {
    pub fn new(gate: ReadinessGate, gateway: Arc<dyn Gateway>, ready_timeout: Duration) -> Self {
        Self {
            gate,
            gateway,
            ready_timeout,
        }
    }

    /// Send `payload` to `recipient`. Returns whether the gateway accepted it.
    pub async fn send(&self, recipient: &str, payload: &str) -> bool {
        let recipient = match RecipientId::parse(recipient) {
            Ok(recipient) => recipient,
            Err(e) => {
                warn!("Not sending notification: {e}");
                return false;
            }
        };

        if let Err(e) = self.gate.wait_until_ready(self.ready_timeout).await {
            warn!("Not sending notification to {recipient}: {e}");
            return false;
        }

        match self.gateway.lookup_recipient(&recipient).await {
            Ok(lookup) if lookup.exists => {}
            Ok(_) => {
                warn!("Recipient {recipient} is not registered with the gateway");
                return false;
            }
            Err(e) => {
                warn!("Failed to look up recipient {recipient}: {e}");
                return false;
            }
        }

        match self.gateway.send_message(&recipient, payload).await {
            Ok(()) => {
                info!("Notification sent to {recipient}");
                true
            }
            Err(e) => {
                error!("Failed to send notification to {recipient}: {e}");
                false
            }
        }
    }

    /// Send each `(recipient, payload)` pair in order. A failed send never
    /// stops the rest of the batch.
    pub async fn send_batch<'a, I>(&self, messages: I) -> DeliveryReport
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut report = DeliveryReport::default();
        for (recipient, payload) in messages {
            if self.send(recipient, payload).await {
                report.sent += 1;
            } else {
                report.failed += 1;
            }
        }
        debug!(
            "Batch finished: {} sent, {} failed",
            report.sent, report.failed
        );
        report
    }
}
