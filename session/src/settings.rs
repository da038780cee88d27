use std::time::Duration;

use service::config::Config;

use crate::credentials::FlushPolicy;
use crate::reconnect::DEFAULT_RECONNECT_DELAY;

pub const DEFAULT_CREDENTIAL_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_millis(15000);

/// Timing and shutdown policy for one gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub reconnect_delay: Duration,
    pub credential_debounce: Duration,
    pub ready_timeout: Duration,
    pub shutdown_flush: FlushPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            credential_debounce: DEFAULT_CREDENTIAL_DEBOUNCE,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            shutdown_flush: FlushPolicy::Flush,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
            credential_debounce: Duration::from_millis(config.credential_debounce_ms),
            ready_timeout: Duration::from_millis(config.ready_timeout_ms),
            shutdown_flush: if config.flush_credentials_on_shutdown {
                FlushPolicy::Flush
            } else {
                FlushPolicy::Discard
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_config_defaults_match_settings_defaults() {
        let config = Config::try_parse_from(["gateway"]).unwrap();
        assert_eq!(Settings::from(&config), Settings::default());
    }

    #[test]
    fn test_discard_policy_from_config() {
        let config =
            Config::try_parse_from(["gateway", "--flush-credentials-on-shutdown", "false"])
                .unwrap();
        assert_eq!(Settings::from(&config).shutdown_flush, FlushPolicy::Discard);
    }
}
