use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use std::path::{Path, PathBuf};

/// Default location of the persisted credential snapshot.
pub const DEFAULT_CREDENTIALS_PATH: &str = "./credentials/session.json";

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// File holding the most recent gateway credential snapshot.
    #[arg(long, env, default_value = DEFAULT_CREDENTIALS_PATH)]
    credentials_path: PathBuf,

    /// Fixed delay in milliseconds between a transient disconnect and the next connect attempt
    #[arg(long, env, default_value_t = 5000)]
    pub reconnect_delay_ms: u64,

    /// Quiet period in milliseconds before a burst of credential updates is written to disk
    #[arg(long, env, default_value_t = 1000)]
    pub credential_debounce_ms: u64,

    /// How long in milliseconds a send waits for the session to become ready
    #[arg(long, env, default_value_t = 15000)]
    pub ready_timeout_ms: u64,

    /// Write a pending credential snapshot during shutdown instead of discarding it
    #[arg(
        long,
        env,
        default_value_t = true,
        action = clap::ArgAction::Set,
    )]
    pub flush_credentials_on_shutdown: bool,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)),
        )]
    pub log_level_filter: LevelFilter,
}

impl Default for Config {
    /// Builds a config from defaults and the environment only, ignoring the
    /// process arguments (which belong to whatever harness is running).
    fn default() -> Self {
        Config::parse_from([env!("CARGO_PKG_NAME")])
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    pub fn set_credentials_path(mut self, credentials_path: impl Into<PathBuf>) -> Self {
        self.credentials_path = credentials_path.into();
        self
    }
}
