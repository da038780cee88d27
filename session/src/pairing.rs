use log::*;

/// Surfaces a one-time pairing challenge to an operator.
///
/// Called from the session's event path: implementations must hand the code
/// off and return without blocking.
#[cfg_attr(test, mockall::automock)]
pub trait PairingChallengeEmitter: Send + Sync {
    fn display(&self, code: &str);
}

/// Writes pairing codes to the application log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPairingEmitter;

impl PairingChallengeEmitter for LogPairingEmitter {
    fn display(&self, code: &str) {
        info!("Gateway pairing requested. Link the account with code: {code}");
    }
}
