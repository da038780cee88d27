//! Error types for the `session` crate.
//!
//! Follows the workspace pattern of a root `Error` struct holding an error
//! kind and an optional source for chaining.

use std::error::Error as StdError;
use std::fmt;

/// Top-level error type for the session crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Categories of failure around the gateway session.
///
/// Only `ReadinessTimeout`, `TerminalAuth` and `Shutdown` ever reach a caller
/// of the readiness gate; everything else is contained inside the
/// coordinator and turned into a state transition or a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Recoverable drop of the gateway session; triggers a scheduled reconnect.
    TransientConnection,
    /// Explicit logout or revoked credentials; no automatic reconnect.
    TerminalAuth,
    /// A caller waited longer than its deadline for the session to open.
    ReadinessTimeout,
    /// The session was shut down while (or before) the caller waited.
    Shutdown,
    /// Loading or saving credential material failed.
    Persistence,
    /// The gateway rejected a lookup or a delivery.
    Gateway,
    /// The recipient identifier is malformed.
    InvalidRecipient,
}

impl Error {
    pub fn new(error_kind: ErrorKind, message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self.error_kind {
            ErrorKind::TransientConnection => "Transient connection error",
            ErrorKind::TerminalAuth => "Terminal authentication error",
            ErrorKind::ReadinessTimeout => "Readiness timeout",
            ErrorKind::Shutdown => "Session shut down",
            ErrorKind::Persistence => "Credential persistence error",
            ErrorKind::Gateway => "Gateway error",
            ErrorKind::InvalidRecipient => "Invalid recipient",
        };
        match &self.source {
            Some(source) => write!(f, "{label}: {source}"),
            None => write!(f, "{label}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Persistence,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Persistence,
        }
    }
}

/// Helper function to create connection errors.
pub fn connection_error(terminal: bool, reason: &str) -> Error {
    let kind = if terminal {
        ErrorKind::TerminalAuth
    } else {
        ErrorKind::TransientConnection
    };
    Error::new(kind, reason)
}

/// Helper function to create gateway errors.
pub fn gateway_error(message: &str) -> Error {
    Error::new(ErrorKind::Gateway, message)
}

/// Helper function to create persistence errors.
pub fn persistence_error(message: &str) -> Error {
    Error::new(ErrorKind::Persistence, message)
}
