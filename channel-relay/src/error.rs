//! Error types for channel-relay.

use channel_core::AuthError;
use channel_net::{ChannelError, HandshakeError};

/// Main error type for relay operations.
///
/// Errors on the two legs of a session are kept apart so logs show which
/// side failed.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Could not open the origin connection.
    #[error("origin {addr} unreachable: {source}")]
    OriginUnreachable {
        /// Configured origin address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Key agreement with the client failed.
    #[error("client handshake failed: {0}")]
    ClientHandshake(#[source] HandshakeError),

    /// Key agreement with the origin failed.
    #[error("origin handshake failed: {0}")]
    OriginHandshake(#[source] HandshakeError),

    /// The client leg failed.
    #[error("client channel error: {0}")]
    ClientChannel(#[source] ChannelError),

    /// The origin leg failed.
    #[error("origin channel error: {0}")]
    OriginChannel(#[source] ChannelError),

    /// The origin closed while a request was in flight.
    #[error("origin closed the connection")]
    OriginClosed,

    /// A response from the origin failed verification.
    #[error("origin response rejected: {0}")]
    OriginAuthentication(#[source] AuthError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    pub(crate) fn unreachable(addr: impl Into<String>, source: std::io::Error) -> Self {
        Self::OriginUnreachable {
            addr: addr.into(),
            source,
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
