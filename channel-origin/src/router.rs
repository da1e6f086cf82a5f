//! Request router: maps a verified request onto the content store.
//!
//! Store outcomes never cross the connection as errors; each one becomes a
//! response status. Signing is left to the session.

use std::sync::Arc;

use channel_types::{Command, Request, Response, Status};

use crate::error::StoreError;
use crate::store::{ContentStore, Owner};

/// Dispatches requests to a [`ContentStore`].
#[derive(Clone)]
pub struct Router {
    store: Arc<dyn ContentStore>,
    server_info: String,
}

impl Router {
    /// Create a router over `store`, stamping `server_info` on responses.
    pub fn new(store: Arc<dyn ContentStore>, server_info: impl Into<String>) -> Self {
        Self {
            store,
            server_info: server_info.into(),
        }
    }

    /// The content store behind this router.
    pub fn store(&self) -> &Arc<dyn ContentStore> {
        &self.store
    }

    /// Produce the (unsigned) response for `request`.
    pub async fn route(&self, request: &Request) -> Response {
        match &request.command {
            Command::Get => self.get(request).await,
            Command::Post => self.post(request).await,
            Command::Delete => self.delete(request).await,
            Command::Other(verb) => {
                tracing::warn!("Unknown command: {}", verb);
                self.unauthorized()
            }
        }
    }

    async fn get(&self, request: &Request) -> Response {
        let status = match self.store.get(&request.url).await {
            Ok(content) => {
                tracing::info!("GET {} ({} bytes)", request.url, content.len());
                return self
                    .response(Status::Ok)
                    .with_url(&request.url)
                    .with_content(content);
            }
            Err(e) => failure("GET", &request.url, &e, Status::NotFound),
        };
        self.response(status).with_url(&request.url)
    }

    async fn post(&self, request: &Request) -> Response {
        let owner = owner_of(request);
        let status = match self.store.post(&request.url, &owner, &request.content).await {
            Ok(()) => {
                tracing::info!(
                    "POST {} by {} ({} bytes)",
                    request.url,
                    owner.client_id,
                    request.content.len()
                );
                Status::Ok
            }
            Err(e) => failure("POST", &request.url, &e, Status::Forbidden),
        };
        self.response(status)
            .with_url(&request.url)
            .with_content(request.content.clone())
    }

    async fn delete(&self, request: &Request) -> Response {
        let owner = owner_of(request);
        let status = match self.store.delete(&request.url, &owner).await {
            Ok(()) => {
                tracing::info!("DELETE {} by {}", request.url, owner.client_id);
                Status::Ok
            }
            Err(e) => failure("DELETE", &request.url, &e, Status::Forbidden),
        };
        self.response(status).with_url(&request.url)
    }

    /// The FAIL-401 answer: no url, no content.
    pub fn unauthorized(&self) -> Response {
        self.response(Status::Unauthorized)
    }

    /// Status-only answer for a response too large to send.
    ///
    /// A GET that cannot be delivered is FAIL-404. Any other verb keeps its
    /// status, since the store operation already happened, and drops the
    /// echoed content.
    pub fn undeliverable(&self, request: &Request, status: Status) -> Response {
        let status = match request.command {
            Command::Get => Status::NotFound,
            _ => status,
        };
        self.response(status).with_url(&request.url)
    }

    fn response(&self, status: Status) -> Response {
        Response::new(status, self.server_info.clone())
    }
}

fn owner_of(request: &Request) -> Owner {
    Owner::new(request.client_id.clone(), request.client_info.clone())
}

/// Log a store failure and return the status it maps to.
fn failure(verb: &str, url: &str, err: &StoreError, status: Status) -> Status {
    match err {
        StoreError::Io { .. } | StoreError::CorruptOwner { .. } => {
            tracing::error!("{} {} failed: {}", verb, url, err);
        }
        _ => tracing::info!("{} {} -> {}: {}", verb, url, status.code(), err),
    }
    status
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use channel_types::DEFAULT_SERVER_INFO;

    fn router() -> Router {
        Router::new(Arc::new(MemoryStore::new()), DEFAULT_SERVER_INFO)
    }

    fn request(command: Command, url: &str, id: &str, info: &str, content: &[u8]) -> Request {
        Request::new(command, url, id, info, content.to_vec())
    }

    #[tokio::test]
    async fn scenario() {
        let router = router();

        let r = router.route(&request(Command::Get, "/", "7421", "hostA", b"")).await;
        assert_eq!(r.status, Status::NotFound);

        let r = router
            .route(&request(Command::Post, "notes.txt", "7421", "hostA", b"hello"))
            .await;
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.content, b"hello");

        let r = router
            .route(&request(Command::Get, "notes.txt", "7421", "hostA", b""))
            .await;
        assert_eq!(r.status, Status::Ok);
        assert_eq!(r.content, b"hello");
        assert_eq!(r.url, "notes.txt");

        let r = router
            .route(&request(Command::Delete, "notes.txt", "9001", "hostA", b""))
            .await;
        assert_eq!(r.status, Status::Forbidden);
        assert!(r.content.is_empty());

        let r = router
            .route(&request(Command::Get, "notes.txt", "9001", "hostA", b""))
            .await;
        assert_eq!(r.status, Status::Ok);

        let r = router
            .route(&request(Command::Delete, "notes.txt", "7421", "hostA", b""))
            .await;
        assert_eq!(r.status, Status::Ok);

        let r = router
            .route(&request(Command::Get, "notes.txt", "7421", "hostA", b""))
            .await;
        assert_eq!(r.status, Status::NotFound);
    }

    #[tokio::test]
    async fn rejected_post_still_echoes_content() {
        let router = router();
        router
            .route(&request(Command::Post, "a", "1", "h", b"first"))
            .await;

        let r = router
            .route(&request(Command::Post, "a", "2", "h", b"second"))
            .await;
        assert_eq!(r.status, Status::Forbidden);
        assert_eq!(r.content, b"second");

        let r = router.route(&request(Command::Get, "a", "2", "h", b"")).await;
        assert_eq!(r.content, b"first");
    }

    #[tokio::test]
    async fn delete_missing_is_forbidden() {
        let r = router()
            .route(&request(Command::Delete, "ghost", "1", "h", b""))
            .await;
        assert_eq!(r.status, Status::Forbidden);
    }

    #[tokio::test]
    async fn invalid_names_map_by_verb() {
        let router = router();
        let get = router.route(&request(Command::Get, "/.owners", "1", "h", b"")).await;
        assert_eq!(get.status, Status::NotFound);

        let post = router
            .route(&request(Command::Post, "../x", "1", "h", b"x"))
            .await;
        assert_eq!(post.status, Status::Forbidden);
    }

    #[tokio::test]
    async fn unknown_command_is_unauthorized() {
        let r = router()
            .route(&request(
                Command::Other("PATCH".into()),
                "notes.txt",
                "1",
                "h",
                b"body",
            ))
            .await;
        assert_eq!(r.status, Status::Unauthorized);
        assert!(r.url.is_empty());
        assert!(r.content.is_empty());
    }

    #[tokio::test]
    async fn responses_carry_defaults_and_no_signature() {
        let router = Router::new(Arc::new(MemoryStore::new()), "test origin");
        let r = router.route(&request(Command::Get, "/", "1", "h", b"")).await;
        assert_eq!(r.server_info, "test origin");
        assert_eq!(r.proto_version, channel_types::PROTO_VERSION);
        assert_eq!(r.encoding, channel_types::DEFAULT_ENCODING);
        assert!(r.signature.is_empty());
    }

    #[tokio::test]
    async fn any_holder_of_the_credential_can_delete() {
        // Ownership is (client_id, client_info) only; it is not tied to the
        // connection that created the object.
        let router = router();
        router
            .route(&request(Command::Post, "shared", "7421", "hostA", b"x"))
            .await;
        let r = router
            .route(&request(Command::Delete, "shared", "7421", "hostA", b""))
            .await;
        assert_eq!(r.status, Status::Ok);
    }

    #[test]
    fn undeliverable_drops_content() {
        let router = router();

        let get = request(Command::Get, "big", "1", "h", b"");
        let r = router.undeliverable(&get, Status::Ok);
        assert_eq!(r.status, Status::NotFound);
        assert_eq!(r.url, "big");

        let post = request(Command::Post, "big", "1", "h", b"payload");
        let r = router.undeliverable(&post, Status::Ok);
        assert_eq!(r.status, Status::Ok);
        assert!(r.content.is_empty());
    }
}
