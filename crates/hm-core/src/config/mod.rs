//! Configuration management for the Hysteria2 manager

mod manager;
pub mod serde_utils;

pub use manager::ManagerConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Directory holding the manager's own state and settings
pub const DEFAULT_STATE_DIR: &str = "/opt/hysteria-web";

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    Path::new(DEFAULT_STATE_DIR).join("manager.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}
