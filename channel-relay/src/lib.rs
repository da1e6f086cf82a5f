//! # channel-relay
//!
//! Authenticating relay for securechannel.
//!
//! The relay sits between clients and an origin. Every client connection
//! gets its own origin connection, and each side negotiates its own session
//! key. Requests are verified under the client key and re-signed under the
//! origin key; responses travel back the same way in reverse.
//!
//! ## Architecture
//!
//! ```text
//!  client ──► RelaySession ──────────────► origin
//!             client channel  origin channel
//!             (responder)     (initiator)
//! ```
//!
//! A request with a bad signature is answered FAIL-401 by the relay itself
//! and never reaches the origin. A response with a bad signature ends the
//! session, since there is nobody left to report it to.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod server;
pub mod session;

pub use config::{Config, ConfigError};
pub use error::{RelayError, Result};
pub use server::{start_relay, RelayMetrics, RelayServer};
pub use session::{redial, Redial, RelaySession};

/// `server_info` on responses the relay answers itself.
pub const RELAY_SERVER_INFO: &str = "securechannel relay v1.0";
