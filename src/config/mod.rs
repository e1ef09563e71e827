//! Configuration: agent settings, topic list, and on-disk locations.

pub mod agent;
pub mod format;

use std::path::PathBuf;

pub use agent::{write_default_config, AgentConfig, OracleProvider};
pub use format::ConfigFormat;

const APP_DIR: &str = "watchdog-agent";

/// `~/.config/watchdog-agent` (platform equivalent elsewhere).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(APP_DIR)
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

/// `~/.cache/watchdog-agent` (platform equivalent elsewhere).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_DIR)
}
