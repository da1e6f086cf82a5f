//! Content store: objects plus the owner recorded when each was created.
//!
//! An object and its owner record form one entry. They are created
//! together, removed together, and every operation on a name runs under
//! that name's lock, so no caller can observe one without the other.

mod fs;
mod locks;
mod memory;
mod name;

pub use fs::FsStore;
pub use memory::MemoryStore;
pub use name::{ObjectName, DEFAULT_OBJECT, MAX_NAME_LEN};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

/// Ownership credential captured at creation time.
///
/// Both fields are supplied by the client; a delete is allowed only when
/// both match exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    /// Client-chosen session token.
    pub client_id: String,
    /// Host-identifying metadata.
    pub client_info: String,
}

impl Owner {
    /// Create an owner credential.
    pub fn new(client_id: impl Into<String>, client_info: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_info: client_info.into(),
        }
    }
}

/// Trait for content store backends.
///
/// Every method normalizes `url` through [`ObjectName::parse`] first.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Read an object. No ownership check.
    async fn get(&self, url: &str) -> StoreResult<Vec<u8>>;

    /// Create an object owned by `owner`.
    ///
    /// Returns `Conflict` if the name is taken; existing objects are never
    /// overwritten.
    async fn post(&self, url: &str, owner: &Owner, content: &[u8]) -> StoreResult<()>;

    /// Remove an object and its owner record.
    ///
    /// Returns `NotFound` if absent and `Forbidden` if `owner` does not
    /// match the recorded owner.
    async fn delete(&self, url: &str, owner: &Owner) -> StoreResult<()>;

    /// Recorded owner of an object, if the object exists and has one.
    async fn owner_of(&self, url: &str) -> StoreResult<Option<Owner>>;
}
