//! Configuration module for coinpulse-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments, and
//! environment variables. The database URL never lives in the file; it comes
//! from the environment only.

pub mod file;

use std::path::Path;

use thiserror::Error;

use crate::config::file::FileConfig;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("DATABASE_URL environment variable not set")]
    MissingDatabaseUrl,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: std::path::PathBuf,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
        }
    }

    /// Load and validate the configuration.
    ///
    /// The cron expression is deliberately not validated here: the scheduler
    /// parses it itself and runs with the job disabled when it is invalid.
    pub fn load(&self) -> Result<FileConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let config: FileConfig = toml::from_str(&config_content)?;
        self.validate(&config)?;
        Ok(config)
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        if config.bus.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "bus url must not be empty".to_string(),
            ));
        }
        if config.assets.tracked.is_empty() {
            return Err(ConfigError::ValidationError(
                "assets.tracked must list at least one asset".to_string(),
            ));
        }
        for (index, asset) in config.assets.tracked.iter().enumerate() {
            if config.assets.tracked[..index].contains(asset) {
                return Err(ConfigError::ValidationError(format!(
                    "assets.tracked lists '{asset}' more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Get the database URL from the environment.
pub fn get_database_url() -> Result<String, ConfigError> {
    std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingDatabaseUrl)
}
