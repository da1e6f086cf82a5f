//! Error types for channel-core.

use thiserror::Error;

/// Message authentication errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Signature missing, malformed, or computed under another key.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Key agreement errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Peer public key produced an all-zero shared secret (low-order point).
    #[error("peer key share is not contributory")]
    NonContributory,

    /// HKDF expansion failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Peer's confirmation tag did not match the derived key.
    #[error("key confirmation failed")]
    ConfirmationFailed,
}
