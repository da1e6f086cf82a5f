//! Object name normalization.
//!
//! The namespace is flat: every `/` is dropped, and an empty result maps to
//! the default object. Names that could reach outside the store root or
//! collide with the store's own bookkeeping files are rejected.

use crate::error::StoreError;

/// Object served for `""` and `"/"`.
pub const DEFAULT_OBJECT: &str = "index";

/// Longest accepted name in bytes (leaves room for marker suffixes).
pub const MAX_NAME_LEN: usize = 200;

/// A normalized, validated object name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectName(String);

impl ObjectName {
    /// Normalize a request url into an object name.
    pub fn parse(url: &str) -> Result<Self, StoreError> {
        let flat: String = url.chars().filter(|c| *c != '/').collect();
        if flat.is_empty() {
            return Ok(Self(DEFAULT_OBJECT.to_string()));
        }

        let reserved = flat.starts_with('.');
        let unsafe_chars = flat.contains(['\\', '\0']);
        if reserved || unsafe_chars || flat.len() > MAX_NAME_LEN {
            return Err(StoreError::InvalidName {
                url: url.to_string(),
            });
        }

        Ok(Self(flat))
    }

    /// The name as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
