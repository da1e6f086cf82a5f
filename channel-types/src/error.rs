//! Error types for the wire format.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Encode(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed (malformed or truncated input)
    #[error("deserialization failed: {0}")]
    Decode(#[source] rmp_serde::decode::Error),

    /// Status string outside the closed status set
    #[error("unknown status: {0:?}")]
    UnknownStatus(String),
}
