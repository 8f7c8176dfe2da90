mod config;
pub mod database;
pub mod persistence;

pub use config::{Config, LogConfig, OutboxConfig, RemoteConfig, TimerConfig};
pub use database::{Database, KvStore, MemoryKv};
pub use persistence::PersistenceBridge;

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the data directory.
///
/// `FOCUSBOARD_HOME` wins when set. Otherwise `~/.config/focusboard[-dev]/`,
/// with `FOCUSBOARD_ENV=dev` selecting the development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("FOCUSBOARD_HOME") {
        Some(home) => PathBuf::from(home),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("FOCUSBOARD_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("focusboard-dev")
            } else {
                base_dir.join("focusboard")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
