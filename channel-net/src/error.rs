//! Error types for channel-net.

use channel_core::ExchangeError;
use channel_types::WireError;

/// Framing errors. All of them are fatal for the connection.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// I/O error on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Length prefix above the configured maximum.
    #[error("frame too large: {size} bytes (limit: {limit} bytes)")]
    TooLarge {
        /// Announced frame size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// Stream ended in the middle of a frame.
    #[error("stream ended mid-frame")]
    Truncated,

    /// No complete frame arrived within the idle timeout.
    #[error("read timed out")]
    Timeout,
}

/// Key agreement failures. The connection is closed; no session exists.
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    /// Framing failed during the handshake.
    #[error("handshake framing failed: {0}")]
    Frame(#[from] FrameError),

    /// Handshake message could not be encoded or decoded.
    #[error("handshake message malformed: {0}")]
    Wire(#[from] WireError),

    /// Key agreement or confirmation failed.
    #[error("key agreement failed: {0}")]
    Exchange(#[from] ExchangeError),

    /// Peer speaks another handshake version.
    #[error("handshake version mismatch: local={local}, remote={remote}")]
    VersionMismatch {
        /// Our version.
        local: u8,
        /// Peer's version.
        remote: u8,
    },

    /// Peer sent a handshake message out of order.
    #[error("unexpected handshake message: expected {expected}, got {actual}")]
    UnexpectedMessage {
        /// Expected message kind.
        expected: &'static str,
        /// Received message kind.
        actual: &'static str,
    },

    /// Peer closed the connection before the handshake finished.
    #[error("peer closed during handshake")]
    Closed,

    /// Handshake did not finish in time.
    #[error("handshake timed out")]
    Timeout,
}

/// Errors on an established channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Framing failed (connection-fatal).
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    /// Payload was not a valid message (connection-fatal).
    #[error("decode error: {0}")]
    Wire(#[from] WireError),
}

/// Result type alias for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_error_display() {
        let err = FrameError::TooLarge {
            size: 10,
            limit: 5,
        };
        assert_eq!(err.to_string(), "frame too large: 10 bytes (limit: 5 bytes)");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<FrameError>();
        assert_send_sync::<HandshakeError>();
        assert_send_sync::<ChannelError>();
    }
}
