//! # channel-origin
//!
//! Origin server for securechannel.
//!
//! The origin serves a flat namespace of file objects:
//! - GET reads any object (reads are public)
//! - POST creates an object if absent and records its owner
//! - DELETE removes an object, only for the owner that created it
//!
//! ## Architecture
//!
//! ```text
//!  relay / client ──► OriginSession ──► Router ──► ContentStore
//!                     (handshake,       (verb →     (objects +
//!                      verify, sign)     status)     owner records)
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod router;
pub mod server;
pub mod session;
pub mod store;

pub use config::{Config, ConfigError, StorageBackend};
pub use error::{OriginError, StoreError};
pub use router::Router;
pub use server::{start_origin, OriginMetrics, OriginServer};
pub use store::{ContentStore, FsStore, MemoryStore, ObjectName, Owner};
