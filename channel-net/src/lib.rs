//! # channel-net
//!
//! Framing and session establishment for securechannel.
//!
//! Every message travels as one frame: a 4-byte big-endian length followed
//! by the MessagePack payload. A connection starts with the key agreement
//! handshake ([`handshake`]); the resulting [`Channel`] then carries signed
//! requests and responses until either side closes.
//!
//! Everything here is generic over `AsyncRead + AsyncWrite`, so tests run on
//! `tokio::io::duplex` and servers run on `TcpStream`.
//!
//! The server side shares one accept loop ([`serve_connections`]) and one
//! admission policy ([`Admission`]) between the relay and the origin.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod channel;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod limits;
pub mod listener;

pub use channel::{Channel, ChannelConfig};
pub use error::{ChannelError, FrameError, HandshakeError};
pub use frame::DEFAULT_MAX_FRAME_SIZE;
pub use limits::{Admission, LimitsConfig, RateLimitError, SessionSlot};
pub use listener::{serve_connections, ConnectionHandler, ServerHandle};
