//! Configuration loading for the relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`).
//! Every section and field is optional.

use channel_net::LimitsConfig;
use serde::Deserialize;
use std::path::PathBuf;

use crate::RELAY_SERVER_INFO;

/// Root configuration for the relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Connection limits, applied to client connections.
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Client-facing listen address (default: 0.0.0.0:8443).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Origin to forward to (default: 127.0.0.1:9000).
    #[serde(default = "default_origin_address")]
    pub origin_address: String,
    /// Identification on responses the relay answers itself.
    #[serde(default = "default_server_info")]
    pub server_info: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8443".to_string()
}

fn default_origin_address() -> String {
    "127.0.0.1:9000".to_string()
}

fn default_server_info() -> String {
    RELAY_SERVER_INFO.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            origin_address: default_origin_address(),
            server_info: default_server_info(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
