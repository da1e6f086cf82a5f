//! Request - the record a client sends through the relay to the origin.

use serde::{Deserialize, Serialize};

use crate::canonical::{CanonicalWriter, Signable};
use crate::{WireError, DEFAULT_ENCODING, PROTO_VERSION};

/// Request verb.
///
/// On the wire this is the upper-case verb string. Anything that is not
/// GET, POST or DELETE still decodes, as [`Command::Other`], so the origin
/// can answer it instead of dropping the connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Command {
    /// Fetch an object
    Get,
    /// Create an object (first writer wins)
    Post,
    /// Remove an object owned by the caller
    Delete,
    /// Unknown or malformed verb, kept verbatim
    Other(String),
}

impl Command {
    /// The wire form of this verb.
    pub fn as_str(&self) -> &str {
        match self {
            Command::Get => "GET",
            Command::Post => "POST",
            Command::Delete => "DELETE",
            Command::Other(verb) => verb,
        }
    }
}

impl From<String> for Command {
    fn from(value: String) -> Self {
        match value.as_str() {
            "GET" => Command::Get,
            "POST" => Command::Post,
            "DELETE" => Command::Delete,
            _ => Command::Other(value),
        }
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Command::from(value.to_string())
    }
}

impl From<Command> for String {
    fn from(value: Command) -> Self {
        match value {
            Command::Other(verb) => verb,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client request.
///
/// `client_id` and `client_info` together form the ownership credential
/// recorded when an object is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Request verb
    pub command: Command,
    /// Protocol version (currently "1.0")
    pub proto_version: String,
    /// Object name, normalized by the store
    pub url: String,
    /// Client-chosen session token
    pub client_id: String,
    /// Host-identifying metadata supplied by the client
    pub client_info: String,
    /// Content encoding
    pub encoding: String,
    /// Request body (POST payload)
    pub content: Vec<u8>,
    /// Hex HMAC over the canonical body
    pub signature: String,
}

impl Request {
    /// Create an unsigned request with default version and encoding.
    pub fn new(
        command: Command,
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_info: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            command,
            proto_version: PROTO_VERSION.to_string(),
            url: url.into(),
            client_id: client_id.into(),
            client_info: client_info.into(),
            encoding: DEFAULT_ENCODING.to_string(),
            content,
            signature: String::new(),
        }
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

impl Signable for Request {
    fn canonical_body(&self) -> Vec<u8> {
        CanonicalWriter::with_capacity(64 + self.content.len())
            .field(self.command.as_str().as_bytes())
            .field(self.proto_version.as_bytes())
            .field(self.url.as_bytes())
            .field(self.client_id.as_bytes())
            .field(self.client_info.as_bytes())
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
