//! # channel-types
//!
//! Wire format types for the securechannel relay protocol.
//!
//! This crate provides the records exchanged between client, relay and origin:
//! - [`Request`] / [`Command`] - what a client asks for
//! - [`Response`] / [`Status`] - what the origin answers
//! - [`Handshake`] - key agreement messages sent before any request
//! - [`Signable`] - canonical body used as MAC input
//! - [`WireError`] - encode/decode failures

#![warn(missing_docs)]
#![warn(clippy::all)]

mod canonical;
mod error;
mod handshake;
mod request;
mod response;

pub use canonical::Signable;
pub use error::WireError;
pub use handshake::{Handshake, KeyConfirm, KeyShare, HANDSHAKE_VERSION, PUBLIC_KEY_SIZE};
pub use request::{Command, Request};
pub use response::{Response, Status};

/// Protocol version stamped on every message.
pub const PROTO_VERSION: &str = "1.0";

/// Content encoding stamped on every message.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Server identification stamped on origin responses unless configured.
pub const DEFAULT_SERVER_INFO: &str = "securechannel origin v1.0";
