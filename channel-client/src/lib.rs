//! # channel-client
//!
//! Client library for securechannel.
//!
//! A [`Client`] runs the handshake as initiator, signs every request with
//! its session key and refuses any response whose signature does not
//! verify. It speaks to a relay or to an origin directly; both look the same
//! from here.
//!
//! ## Example
//!
//! ```ignore
//! use channel_client::{Client, ClientIdentity};
//!
//! let mut client = Client::connect("127.0.0.1:8443", ClientIdentity::generate()).await?;
//! client.post("notes.txt", b"hello".to_vec()).await?;
//! let response = client.get("notes.txt").await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod identity;

pub use client::{Client, ClientError, Result};
pub use identity::ClientIdentity;
