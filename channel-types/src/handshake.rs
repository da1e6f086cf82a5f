//! Handshake messages exchanged before the first request on a connection.

use serde::{Deserialize, Serialize};

use crate::WireError;

/// Handshake protocol version (currently 1).
pub const HANDSHAKE_VERSION: u8 = 1;

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// All handshake messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Handshake {
    /// Ephemeral public key share
    KeyShare(KeyShare),
    /// Proof of possession of the derived session key
    KeyConfirm(KeyConfirm),
}

impl Handshake {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec_named(self).map_err(WireError::Encode)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Decode)
    }

    /// Short name for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Handshake::KeyShare(_) => "KeyShare",
            Handshake::KeyConfirm(_) => "KeyConfirm",
        }
    }
}

/// Ephemeral X25519 public key, sent in the clear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyShare {
    /// Handshake version
    pub version: u8,
    /// X25519 public key
    pub public_key: [u8; PUBLIC_KEY_SIZE],
}

/// Key confirmation tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfirm {
    /// HMAC over the handshake transcript under the derived key
    pub tag: Vec<u8>,
}
