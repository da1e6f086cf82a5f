//! Per-client relay session.
//!
//! A session owns both legs: the client channel and the dedicated origin
//! channel opened for it. Dropping the session closes both sockets.
//!
//! The origin may close its leg on its own idle timeout while the client
//! stays connected. With a [`Redial`] attached, a request that finds the
//! origin leg closed is sent once more over a fresh origin connection.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use channel_core::Role;
use channel_net::{Channel, ChannelConfig, ChannelError, FrameError};
use channel_types::{Request, Response, Status};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{RelayError, Result};
use crate::server::RelayMetrics;

/// Opens a replacement origin connection for a session.
pub type Redial<O> = Box<dyn Fn() -> Pin<Box<dyn Future<Output = Result<O>> + Send>> + Send + Sync>;

/// Box an async dial function as a [`Redial`].
pub fn redial<O, F, Fut>(dial: F) -> Redial<O>
where
    O: 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<O>> + Send + 'static,
{
    Box::new(move || -> Pin<Box<dyn Future<Output = Result<O>> + Send>> { Box::pin(dial()) })
}

/// One client connection and its origin connection.
pub struct RelaySession<C, O> {
    client: Channel<C>,
    origin: Channel<O>,
    metrics: Arc<RelayMetrics>,
    server_info: String,
    redial: Option<Redial<O>>,
}

impl<C, O> RelaySession<C, O>
where
    C: AsyncRead + AsyncWrite + Unpin,
    O: AsyncRead + AsyncWrite + Unpin,
{
    /// Run both handshakes at once: responder towards the client, initiator
    /// towards the origin.
    pub async fn establish(
        client: C,
        origin: O,
        config: ChannelConfig,
        metrics: Arc<RelayMetrics>,
        server_info: impl Into<String>,
    ) -> Result<Self> {
        let (client, origin) = tokio::try_join!(
            async {
                Channel::establish(client, Role::Responder, config)
                    .await
                    .map_err(RelayError::ClientHandshake)
            },
            async {
                Channel::establish(origin, Role::Initiator, config)
                    .await
                    .map_err(RelayError::OriginHandshake)
            },
        )?;

        Ok(Self::new(client, origin, metrics, server_info))
    }

    /// Pair two established channels.
    pub fn new(
        client: Channel<C>,
        origin: Channel<O>,
        metrics: Arc<RelayMetrics>,
        server_info: impl Into<String>,
    ) -> Self {
        Self {
            client,
            origin,
            metrics,
            server_info: server_info.into(),
            redial: None,
        }
    }

    /// Reopen the origin leg with `redial` when it is found closed.
    pub fn with_redial(mut self, redial: Redial<O>) -> Self {
        self.redial = Some(redial);
        self
    }

    /// Relay requests until the client closes.
    ///
    /// Returns an error when either leg fails or the origin sends a response
    /// that does not verify; the caller drops the session, closing both.
    pub async fn run(mut self) -> Result<()> {
        while let Some(request) = self
            .client
            .recv_request()
            .await
            .map_err(RelayError::ClientChannel)?
        {
            if let Err(e) = self.client.authenticate(&request) {
                tracing::warn!("Rejected {} {} from client: {}", request.command, request.url, e);
                self.metrics.auth_failures.fetch_add(1, Ordering::Relaxed);
                let response = Response::new(Status::Unauthorized, self.server_info.clone());
                self.client
                    .send_response(response)
                    .await
                    .map_err(RelayError::ClientChannel)?;
                continue;
            }

            tracing::debug!("Forwarding {} {}", request.command, request.url);
            let response = self.forward(request).await?;

            if let Err(e) = self.origin.authenticate(&response) {
                self.metrics.origin_auth_failures.fetch_add(1, Ordering::Relaxed);
                return Err(RelayError::OriginAuthentication(e));
            }

            tracing::debug!("Returning {} for {}", response.status, response.url);
            self.client
                .send_response(response)
                .await
                .map_err(RelayError::ClientChannel)?;
            self.metrics.requests_forwarded.fetch_add(1, Ordering::Relaxed);
        }

        tracing::debug!("Client closed the session");
        self.origin.close().await;
        Ok(())
    }

    async fn forward(&mut self, request: Request) -> Result<Response> {
        if self.redial.is_none() {
            return self.exchange(request).await;
        }
        match self.exchange(request.clone()).await {
            Err(e) if leg_closed(&e) => {
                tracing::info!("Origin leg closed ({}), redialing", e);
                self.reopen_origin().await?;
                self.exchange(request).await
            }
            result => result,
        }
    }

    async fn exchange(&mut self, request: Request) -> Result<Response> {
        self.origin
            .send_request(request)
            .await
            .map_err(RelayError::OriginChannel)?;
        self.origin
            .recv_response()
            .await
            .map_err(RelayError::OriginChannel)?
            .ok_or(RelayError::OriginClosed)
    }

    async fn reopen_origin(&mut self) -> Result<()> {
        let Some(redial) = &self.redial else {
            return Err(RelayError::OriginClosed);
        };
        let stream = redial().await?;
        let config = *self.origin.config();
        self.origin = Channel::establish(stream, Role::Initiator, config)
            .await
            .map_err(RelayError::OriginHandshake)?;
        self.metrics.origin_redials.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// The origin leg is gone (EOF, reset or broken pipe), as opposed to
/// misbehaving.
fn leg_closed(err: &RelayError) -> bool {
    matches!(
        err,
        RelayError::OriginClosed
            | RelayError::OriginChannel(ChannelError::Frame(
                FrameError::Io(_) | FrameError::Truncated
            ))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RELAY_SERVER_INFO;
    use channel_core::{auth, SessionKey};
    use channel_net::frame::write_frame;
    use channel_net::DEFAULT_MAX_FRAME_SIZE;
    use channel_types::{Command, Request};
    use tokio::io::{duplex, DuplexStream};
    use tokio::task::JoinHandle;

    struct Harness {
        client: Channel<DuplexStream>,
        origin: Channel<DuplexStream>,
        relay: JoinHandle<Result<()>>,
        metrics: Arc<RelayMetrics>,
    }

    async fn harness() -> Harness {
        let (client_end, relay_client_end) = duplex(64 * 1024);
        let (relay_origin_end, origin_end) = duplex(64 * 1024);
        let metrics = Arc::new(RelayMetrics::default());

        let relay = {
            let metrics = metrics.clone();
            tokio::spawn(async move {
                RelaySession::establish(
                    relay_client_end,
                    relay_origin_end,
                    ChannelConfig::default(),
                    metrics,
                    RELAY_SERVER_INFO,
                )
                .await?
                .run()
                .await
            })
        };

        let (client, origin) = tokio::join!(
            Channel::establish(client_end, Role::Initiator, ChannelConfig::default()),
            Channel::establish(origin_end, Role::Responder, ChannelConfig::default()),
        );

        Harness {
            client: client.unwrap(),
            origin: origin.unwrap(),
            relay,
            metrics,
        }
    }

    fn get(url: &str) -> Request {
        Request::new(Command::Get, url, "7421", "hostA", Vec::new())
    }

    #[tokio::test]
    async fn legs_have_independent_keys() {
        let h = harness().await;
        assert_ne!(h.client.key().as_bytes(), h.origin.key().as_bytes());
    }

    #[tokio::test]
    async fn request_and_response_are_re_signed() {
        let mut h = harness().await;

        h.client.send_request(get("notes.txt")).await.unwrap();
        let forwarded = h.origin.recv_request().await.unwrap().unwrap();
        h.origin.authenticate(&forwarded).unwrap();
        assert!(auth::check(&forwarded, h.client.key()).is_err());
        assert_eq!(forwarded.url, "notes.txt");
        assert_eq!(forwarded.client_id, "7421");
        assert_eq!(forwarded.client_info, "hostA");

        let answer = Response::new(Status::Ok, "origin")
            .with_url("notes.txt")
            .with_content(b"hello".to_vec());
        h.origin.send_response(answer).await.unwrap();

        let response = h.client.recv_response().await.unwrap().unwrap();
        h.client.authenticate(&response).unwrap();
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.server_info, "origin");
        assert_eq!(response.url, "notes.txt");
        assert_eq!(response.content, b"hello");

        drop(h.client);
        h.relay.await.unwrap().unwrap();
        assert_eq!(h.metrics.requests_forwarded.load(Ordering::Relaxed), 1);
        // The origin leg was closed with the session.
        assert!(h.origin.recv_request().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bad_client_signature_is_answered_locally() {
        let mut h = harness().await;

        let mut forged = get("secret");
        auth::seal(&mut forged, &SessionKey::random());
        write_frame(
            h.client.get_mut(),
            &forged.to_bytes().unwrap(),
            DEFAULT_MAX_FRAME_SIZE,
        )
        .await
        .unwrap();

        let response = h.client.recv_response().await.unwrap().unwrap();
        h.client.authenticate(&response).unwrap();
        assert_eq!(response.status, Status::Unauthorized);
        assert_eq!(response.server_info, RELAY_SERVER_INFO);
        assert!(response.content.is_empty());

        // The session survives, and the forged request never reached the origin.
        h.client.send_request(get("public")).await.unwrap();
        let forwarded = h.origin.recv_request().await.unwrap().unwrap();
        assert_eq!(forwarded.url, "public");
        h.origin
            .send_response(Response::new(Status::NotFound, "origin"))
            .await
            .unwrap();
        let response = h.client.recv_response().await.unwrap().unwrap();
        assert_eq!(response.status, Status::NotFound);

        assert_eq!(h.metrics.auth_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn forged_origin_response_drops_client() {
        let mut h = harness().await;

        h.client.send_request(get("notes.txt")).await.unwrap();
        h.origin.recv_request().await.unwrap().unwrap();

        let mut forged = Response::new(Status::Ok, "origin").with_content(b"evil".to_vec());
        auth::seal(&mut forged, &SessionKey::random());
        write_frame(
            h.origin.get_mut(),
            &forged.to_bytes().unwrap(),
            DEFAULT_MAX_FRAME_SIZE,
        )
        .await
        .unwrap();

        assert!(matches!(
            h.relay.await.unwrap(),
            Err(RelayError::OriginAuthentication(_))
        ));
        assert!(h.client.recv_response().await.unwrap().is_none());
        assert_eq!(h.metrics.origin_auth_failures.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn origin_hangup_ends_session() {
        let mut h = harness().await;

        h.client.send_request(get("notes.txt")).await.unwrap();
        h.origin.recv_request().await.unwrap().unwrap();
        drop(h.origin);

        assert!(matches!(
            h.relay.await.unwrap(),
            Err(RelayError::OriginClosed)
        ));
        assert!(h.client.recv_response().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn origin_handshake_failure_is_reported() {
        let (client_end, relay_client_end) = duplex(64 * 1024);
        let (relay_origin_end, origin_end) = duplex(64 * 1024);
        drop(origin_end);

        let relay = tokio::spawn(RelaySession::establish(
            relay_client_end,
            relay_origin_end,
            ChannelConfig::default(),
            Arc::new(RelayMetrics::default()),
            RELAY_SERVER_INFO,
        ));

        let client = Channel::establish(client_end, Role::Initiator, ChannelConfig::default()).await;
        assert!(client.is_err());
        assert!(matches!(
            relay.await.unwrap(),
            Err(RelayError::OriginHandshake(_))
        ));
    }

    #[tokio::test]
    async fn closed_origin_leg_is_redialed_once() {
        use channel_origin::session::OriginSession;
        use channel_origin::{MemoryStore, OriginMetrics, Router};
        use std::sync::Mutex;

        let (client_end, relay_client_end) = duplex(64 * 1024);
        let (relay_origin_end, origin_end) = duplex(64 * 1024);
        let (spare_relay_end, spare_origin_end) = duplex(64 * 1024);
        let metrics = Arc::new(RelayMetrics::default());

        let spare = Mutex::new(Some(spare_relay_end));
        let dial = redial(move || {
            let stream = spare.lock().unwrap().take();
            async move { stream.ok_or(RelayError::OriginClosed) }
        });

        let relay = {
            let metrics = metrics.clone();
            tokio::spawn(async move {
                RelaySession::establish(
                    relay_client_end,
                    relay_origin_end,
                    ChannelConfig::default(),
                    metrics,
                    RELAY_SERVER_INFO,
                )
                .await?
                .with_redial(dial)
                .run()
                .await
            })
        };

        let (client, first_origin) = tokio::join!(
            Channel::establish(client_end, Role::Initiator, ChannelConfig::default()),
            Channel::establish(origin_end, Role::Responder, ChannelConfig::default()),
        );
        let mut client = client.unwrap();
        // The origin gives up on the idle leg.
        drop(first_origin.unwrap());

        let store = Arc::new(MemoryStore::new());
        store.insert_unowned("notes.txt", b"hello".to_vec()).unwrap();
        let origin = tokio::spawn(async move {
            OriginSession::accept(
                spare_origin_end,
                Router::new(store, "origin"),
                Arc::new(OriginMetrics::default()),
                ChannelConfig::default(),
            )
            .await
            .unwrap()
            .run()
            .await
            .unwrap();
        });

        client.send_request(get("notes.txt")).await.unwrap();
        let response = client.recv_response().await.unwrap().unwrap();
        client.authenticate(&response).unwrap();
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.content, b"hello");
        assert_eq!(metrics.origin_redials.load(Ordering::Relaxed), 1);

        drop(client);
        relay.await.unwrap().unwrap();
        origin.await.unwrap();
    }
}
