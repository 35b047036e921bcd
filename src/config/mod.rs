//! Configuration management for boardpack
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use boardpack::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Boards staged under: {}", config.worker.download_dir.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `BOARDPACK__<section>__<key>`
//!
//! Examples:
//! - `BOARDPACK__WORKER__DOWNLOAD_DIR=/srv/boards`
//! - `BOARDPACK__WORKER__DISK_LIMIT_PERCENT=90`
//! - `BOARDPACK__CALLBACK__TIMEOUT_SECS=10`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/boardpack.toml`.
//! This can be overridden using the `BOARDPACK_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{CallbackConfig, Config, HttpConfig, StoreConfig, WorkerConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or
    /// validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
