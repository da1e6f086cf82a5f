//! # channel-core
//!
//! Pure logic for securechannel. No I/O, instant tests.
//!
//! - [`auth`] - HMAC-SHA256 signatures over canonical message bodies
//! - [`exchange`] - ephemeral X25519 key agreement with key confirmation
//!
//! The I/O side of the handshake lives in `channel-net`; this crate only
//! computes keys and tags from bytes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod error;
pub mod exchange;

pub use auth::{check, seal, sign, verify, SessionKey, KEY_SIZE};
pub use error::{AuthError, ExchangeError};
pub use exchange::{Agreed, KeyAgreement, Role};
