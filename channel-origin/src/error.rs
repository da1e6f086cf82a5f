//! Error types for channel-origin.

use std::path::PathBuf;

/// Main error type for origin operations.
#[derive(Debug, thiserror::Error)]
pub enum OriginError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Key agreement failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] channel_net::HandshakeError),

    /// Established channel failed.
    #[error("channel error: {0}")]
    Channel(#[from] channel_net::ChannelError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content store outcomes other than success.
///
/// `NotFound`, `Conflict` and `Forbidden` are expected results that the
/// router turns into response statuses.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No object under this name.
    #[error("object not found: {name}")]
    NotFound {
        /// Normalized object name.
        name: String,
    },

    /// An object already exists under this name.
    #[error("object already exists: {name}")]
    Conflict {
        /// Normalized object name.
        name: String,
    },

    /// The caller does not own this object.
    #[error("not the owner of {name}")]
    Forbidden {
        /// Normalized object name.
        name: String,
    },

    /// The url does not map to a storable name.
    #[error("invalid object name: {url:?}")]
    InvalidName {
        /// Url as received.
        url: String,
    },

    /// Filesystem failure.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// Owner record could not be encoded or decoded.
    #[error("corrupt owner record {path}: {source}")]
    CorruptOwner {
        /// Marker path.
        path: PathBuf,
        /// Underlying error.
        source: serde_json::Error,
    },
}

/// Result type alias for origin operations.
pub type Result<T> = std::result::Result<T, OriginError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
