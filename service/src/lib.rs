//! Process-level infrastructure shared by the workspace: configuration
//! parsed from flags and environment, and the global logger.

pub mod config;
pub mod logging;

pub use config::Config;
pub use logging::Logger;
