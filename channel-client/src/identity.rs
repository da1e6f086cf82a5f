//! Client identity: the credential stamped on every request.

/// Fallback `client_info` when the host name is unavailable.
const UNKNOWN_HOST: &str = "unknown-host";

/// The `(client_id, client_info)` pair sent with every request.
///
/// The origin records this pair as the owner of objects the client creates
/// and only accepts a delete that presents the same pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Session token.
    pub client_id: String,
    /// Host-identifying metadata.
    pub client_info: String,
}

impl ClientIdentity {
    /// Explicit identity.
    pub fn new(client_id: impl Into<String>, client_info: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_info: client_info.into(),
        }
    }

    /// Random UUID v4 id and this machine's host name.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), local_hostname())
    }

    /// Replace the id, keeping `client_info`.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Replace `client_info`, keeping the id.
    pub fn with_client_info(mut self, client_info: impl Into<String>) -> Self {
        self.client_info = client_info.into();
        self
    }
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self::generate()
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_differ() {
        let a = ClientIdentity::generate();
        let b = ClientIdentity::generate();
        assert_ne!(a.client_id, b.client_id);
        assert_eq!(a.client_info, b.client_info);
        assert!(uuid::Uuid::parse_str(&a.client_id).is_ok());
        assert!(!a.client_info.is_empty());
    }

    #[test]
    fn overrides_keep_the_other_field() {
        let identity = ClientIdentity::new("7421", "hostA").with_client_id("9001");
        assert_eq!(identity, ClientIdentity::new("9001", "hostA"));

        let identity = identity.with_client_info("hostB");
        assert_eq!(identity, ClientIdentity::new("9001", "hostB"));
    }
}
