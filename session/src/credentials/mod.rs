//! Credential material for the gateway session and where it is kept.
//!
//! - `CredentialStore`: load/save collaborator for the latest snapshot
//! - `FileCredentialStore`: JSON-file implementation with atomic replace
//! - `CredentialWriter`: coalesces bursts of updates into a single save

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub mod file;
pub mod writer;

pub use file::FileCredentialStore;
pub use writer::{CredentialWriter, FlushPolicy};

/// Opaque, versioned credential blob produced by the gateway.
///
/// Only the most recent snapshot matters; no history is retained.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialSnapshot {
    pub version: u64,
    pub payload: serde_json::Value,
}

impl CredentialSnapshot {
    pub fn new(version: u64, payload: serde_json::Value) -> Self {
        Self { version, payload }
    }

    /// Snapshot used when nothing has been persisted yet; opening a session
    /// with it makes the gateway start a fresh pairing.
    pub fn empty() -> Self {
        Self {
            version: 0,
            payload: serde_json::Value::Null,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_null()
    }
}

// Keeps key material out of logs.
impl std::fmt::Debug for CredentialSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSnapshot")
            .field("version", &self.version)
            .field("payload", &"<redacted>")
            .finish()
    }
}

/// Trait for loading and saving the session's credential snapshot.
///
/// Implementations must tolerate `save` being called from a background task
/// while `load` runs for a new connect attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Returns the last saved snapshot, or `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<CredentialSnapshot>, Error>;

    /// Replaces the stored snapshot.
    async fn save(&self, snapshot: CredentialSnapshot) -> Result<(), Error>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = CredentialSnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.version, 0);
        assert!(!CredentialSnapshot::new(1, json!({"noise_key": "abc"})).is_empty());
    }

    #[test]
    fn test_debug_redacts_payload() {
        let snapshot = CredentialSnapshot::new(3, json!({"signed_pre_key": "very-secret"}));
        let rendered = format!("{snapshot:?}");
        assert!(rendered.contains("version: 3"));
        assert!(!rendered.contains("very-secret"));
    }
}
