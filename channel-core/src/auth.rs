//! Message authenticator.
//!
//! Signs the canonical body of a [`Request`](channel_types::Request) or
//! [`Response`](channel_types::Response) with HMAC-SHA256 under the
//! per-connection session key. Signatures travel as lower-case hex.
//!
//! # Security Notes
//!
//! - `verify` compares MACs through `Mac::verify_slice`, which is constant
//!   time in the tag contents.
//! - A signature that is not valid hex, or has the wrong length, verifies
//!   as false. It is never an error the caller has to special-case.

use channel_types::Signable;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Session key size (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Symmetric key shared by the two ends of one connection.
///
/// Derived during the handshake, never transmitted, zeroed on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; KEY_SIZE]);

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a random key (for testing).
    pub fn random() -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    pub(crate) fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size")
    }
}

// Don't leak the key in debug output
impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

/// Compute the hex signature of a canonical body.
pub fn sign(body: &[u8], key: &SessionKey) -> String {
    let mut mac = key.mac();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex signature against a canonical body.
pub fn verify(body: &[u8], signature: &str, key: &SessionKey) -> bool {
    let Ok(tag) = hex::decode(signature) else {
        return false;
    };
    let mut mac = key.mac();
    mac.update(body);
    mac.verify_slice(&tag).is_ok()
}

/// Recompute and set the signature of a message.
pub fn seal<M: Signable>(message: &mut M, key: &SessionKey) {
    let signature = sign(&message.canonical_body(), key);
    message.set_signature(signature);
}

/// Check the signature a message arrived with.
pub fn check<M: Signable>(message: &M, key: &SessionKey) -> Result<(), AuthError> {
    if verify(&message.canonical_body(), message.signature(), key) {
        Ok(())
    } else {
        Err(AuthError::InvalidSignature)
    }
}
