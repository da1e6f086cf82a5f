//! Response - the record the origin answers with.

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalWriter, Signable};
use crate::{WireError, DEFAULT_ENCODING, PROTO_VERSION};

/// Response status.
///
/// A closed set. The wire strings match the ones the origin has always
/// emitted, so older peers can still read them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Status {
    /// Operation succeeded
    Ok,
    /// Unknown command or bad signature
    Unauthorized,
    /// Create over an existing object, or delete without ownership
    Forbidden,
    /// Object does not exist
    NotFound,
}

impl Status {
    /// The wire form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK - 200",
            Status::Unauthorized => "FAIL - 401",
            Status::Forbidden => "FAIL - 403",
            Status::NotFound => "FAIL - 404",
        }
    }

    /// Numeric code, for logs.
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Unauthorized => 401,
            Status::Forbidden => 403,
            Status::NotFound => 404,
        }
    }

    /// Whether this is the success status.
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl TryFrom<String> for Status {
    type Error = WireError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "OK - 200" => Ok(Status::Ok),
            "FAIL - 401" => Ok(Status::Unauthorized),
            "FAIL - 403" => Ok(Status::Forbidden),
            "FAIL - 404" => Ok(Status::NotFound),
            _ => Err(WireError::UnknownStatus(value)),
        }
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An origin response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    /// Outcome of the request
    pub status: Status,
    /// Protocol version (currently "1.0")
    pub proto_version: String,
    /// Object name the request addressed
    pub url: String,
    /// Server identification
    pub server_info: String,
    /// Content encoding
    pub encoding: String,
    /// Response body
    pub content: Vec<u8>,
    /// Hex HMAC over the canonical body
    pub signature: String,
}

impl Response {
    /// Create an unsigned response with default version and encoding.
    pub fn new(status: Status, server_info: impl Into<String>) -> Self {
        Self {
            status,
            proto_version: PROTO_VERSION.to_string(),
            url: String::new(),
            server_info: server_info.into(),
            encoding: DEFAULT_ENCODING.to_string(),
            content: Vec::new(),
            signature: String::new(),
        }
    }

    /// Set the url.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the body.
    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = content;
        self
    }

    /// Serialize to MessagePack bytes (named fields).
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec_named(self).map_err(WireError::Encode)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Decode)
    }
}

impl Signable for Response {
    fn canonical_body(&self) -> Vec<u8> {
        CanonicalWriter::with_capacity(64 + self.content.len())
            .field(self.status.as_str().as_bytes())
            .field(self.proto_version.as_bytes())
            .field(self.url.as_bytes())
            .field(self.server_info.as_bytes())
            .field(self.encoding.as_bytes())
            .field(&self.content)
            .finish()
    }

    fn signature(&self) -> &str {
        &self.signature
    }

    fn set_signature(&mut self, signature: String) {
        self.signature = signature;
    }
}
