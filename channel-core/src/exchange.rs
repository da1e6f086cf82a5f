//! Ephemeral X25519 key agreement.
//!
//! Each connection generates a fresh keypair, so a session key is never
//! reused across connections. The derived key is bound to both public keys
//! through the HKDF info string, and each side proves possession with a
//! role-specific confirmation tag before any request is exchanged.

use hkdf::Hkdf;
use hmac::Mac;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{EphemeralSecret, PublicKey};

use crate::auth::{SessionKey, KEY_SIZE};
use crate::error::ExchangeError;
use channel_types::PUBLIC_KEY_SIZE;

/// HKDF salt, domain-separated for this protocol.
const SESSION_SALT: &[u8] = b"securechannel-session-v1";

const INITIATOR_LABEL: &[u8] = b"securechannel initiator confirm";
const RESPONDER_LABEL: &[u8] = b"securechannel responder confirm";

/// Which end of the connection we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The side that connected and sends the first key share.
    Initiator,
    /// The side that accepted the connection.
    Responder,
}

impl Role {
    fn peer(self) -> Self {
        match self {
            Role::Initiator => Role::Responder,
            Role::Responder => Role::Initiator,
        }
    }

    fn label(self) -> &'static [u8] {
        match self {
            Role::Initiator => INITIATOR_LABEL,
            Role::Responder => RESPONDER_LABEL,
        }
    }
}

/// One side of a key agreement in progress.
pub struct KeyAgreement {
    secret: EphemeralSecret,
    public_key: [u8; PUBLIC_KEY_SIZE],
}

impl KeyAgreement {
    /// Generate a fresh ephemeral keypair.
    pub fn new() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&secret).to_bytes();
        Self { secret, public_key }
    }

    /// Public key to send to the peer.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public_key
    }

    /// Combine with the peer's public key and derive the session key.
    ///
    /// Consumes the ephemeral secret.
    pub fn complete(
        self,
        role: Role,
        peer_public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<Agreed, ExchangeError> {
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(*peer_public_key));
        if !shared.was_contributory() {
            return Err(ExchangeError::NonContributory);
        }

        let mut transcript = [0u8; PUBLIC_KEY_SIZE * 2];
        let (first, second) = transcript.split_at_mut(PUBLIC_KEY_SIZE);
        match role {
            Role::Initiator => {
                first.copy_from_slice(&self.public_key);
                second.copy_from_slice(peer_public_key);
            }
            Role::Responder => {
                first.copy_from_slice(peer_public_key);
                second.copy_from_slice(&self.public_key);
            }
        }

        let hkdf = Hkdf::<Sha256>::new(Some(SESSION_SALT), shared.as_bytes());
        let mut okm = [0u8; KEY_SIZE];
        hkdf.expand(&transcript, &mut okm)
            .map_err(|e| ExchangeError::KeyDerivation(e.to_string()))?;

        Ok(Agreed {
            role,
            key: SessionKey::from_bytes(okm),
            transcript,
        })
    }
}

impl Default for KeyAgreement {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for KeyAgreement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyAgreement")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

/// A derived session key awaiting confirmation.
#[derive(Debug)]
pub struct Agreed {
    role: Role,
    key: SessionKey,
    transcript: [u8; PUBLIC_KEY_SIZE * 2],
}

impl Agreed {
    /// Tag proving we hold the key, to send to the peer.
    pub fn confirm_tag(&self) -> Vec<u8> {
        self.tag_mac(self.role).finalize().into_bytes().to_vec()
    }

    /// Check the peer's confirmation tag.
    pub fn verify_peer(&self, tag: &[u8]) -> Result<(), ExchangeError> {
        self.tag_mac(self.role.peer())
            .verify_slice(tag)
            .map_err(|_| ExchangeError::ConfirmationFailed)
    }

    /// Release the session key once the peer is confirmed.
    pub fn into_key(self) -> SessionKey {
        self.key
    }

    fn tag_mac(&self, role: Role) -> hmac::Hmac<Sha256> {
        let mut mac = self.key.mac();
        mac.update(role.label());
        mac.update(&self.transcript);
        mac
    }
}
