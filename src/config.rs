// src/config.rs

//! Configuration loading utilities.
//!
//! Resolves the configuration file, applies environment overrides and
//! validates the result before anything touches the network.

use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::Config;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "SRU_HARVEST_CONFIG";

/// Configuration file used when [`CONFIG_ENV`] is unset.
pub const DEFAULT_CONFIG_PATH: &str = "harvest.toml";

/// Path of the configuration file for this process.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Load configuration from a TOML file.
///
/// A missing file yields the defaults; a file that exists but does not parse
/// is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        log::info!("No configuration at {}; using defaults", path.display());
        return Ok(Config::default());
    }
    Config::load(path)
        .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))
}

/// Load, apply environment overrides and validate.
pub fn load_all(path: &Path) -> Result<Config> {
    let mut config = load_config(path)?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}
