//! Configuration management
//!
//! This module handles loading and parsing configuration for the Corten CMS
//! core. Configuration can be loaded from:
//! - config.yml file
//! - Environment variables (override file settings)
//!
//! Missing optional values are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Security configuration
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path or URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/corten.db".to_string()
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// When enabled, per-page access rules are loaded and enforced on top
    /// of role checks.
    #[serde(default = "default_access_control_enabled")]
    pub access_control_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            access_control_enabled: default_access_control_enabled(),
        }
    }
}

fn default_access_control_enabled() -> bool {
    false
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError { path: String, message: String },
}

impl Config {
    /// Load configuration from file.
    ///
    /// If the file doesn't exist or is empty, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides.
    ///
    /// Environment variables follow the pattern:
    /// - CORTEN_DATABASE_URL
    /// - CORTEN_ACCESS_CONTROL_ENABLED
    pub fn load_with_env(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("CORTEN_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(enabled) = std::env::var("CORTEN_ACCESS_CONTROL_ENABLED") {
            if let Ok(value) = enabled.parse::<bool>() {
                self.security.access_control_enabled = value;
            }
        }
    }
}
