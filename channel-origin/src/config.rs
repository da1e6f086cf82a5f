//! Configuration loading for the origin.
//!
//! Configuration is loaded from a TOML file (default: `origin.toml`).
//! Every section and field is optional.
//!
//! The origin sits behind the relay, which opens one origin connection per
//! client session from a single address. The per-IP connection rate is
//! therefore off by default here (`connections_per_ip = 0`); the other
//! `[limits]` fields share the relay's defaults.

use channel_net::LimitsConfig;
use channel_types::DEFAULT_SERVER_INFO;
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;

/// Root configuration for the origin.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Connection limits.
    #[serde(default = "default_limits", deserialize_with = "deserialize_limits")]
    pub limits: LimitsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            limits: default_limits(),
        }
    }
}

/// `[limits]` as written for the origin: same fields, no per-IP rate unless set.
#[derive(Deserialize)]
struct OriginLimits {
    #[serde(default)]
    connections_per_ip: u32,
    #[serde(flatten)]
    shared: LimitsConfig,
}

fn default_limits() -> LimitsConfig {
    LimitsConfig {
        connections_per_ip: 0,
        ..LimitsConfig::default()
    }
}

fn deserialize_limits<'de, D>(deserializer: D) -> Result<LimitsConfig, D::Error>
where
    D: Deserializer<'de>,
{
    let limits = OriginLimits::deserialize(deserializer)?;
    Ok(LimitsConfig {
        connections_per_ip: limits.connections_per_ip,
        ..limits.shared
    })
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:9000).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Identification stamped on every response.
    #[serde(default = "default_server_info")]
    pub server_info: String,
}

/// Which store backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Plain files under `root`.
    #[default]
    Fs,
    /// In memory; lost on exit.
    Memory,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Store root directory (default: ./store).
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Backend (default: fs).
    #[serde(default)]
    pub backend: StorageBackend,
}

fn default_bind_address() -> String {
    "0.0.0.0:9000".to_string()
}

fn default_server_info() -> String {
    DEFAULT_SERVER_INFO.to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from("store")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            server_info: default_server_info(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            backend: StorageBackend::default(),
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
