//! An established, keyed connection.

use std::time::Duration;

use channel_core::{auth, AuthError, Role, SessionKey};
use channel_types::{Request, Response, Signable};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::error::{ChannelResult, FrameError, HandshakeError};
use crate::frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
use crate::handshake;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Largest frame accepted or sent.
    pub max_frame_size: usize,
    /// Deadline for the whole handshake.
    pub handshake_timeout: Duration,
    /// Deadline for each read once established (`None` = wait forever).
    pub idle_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }
}

/// A stream plus the session key negotiated on it.
///
/// Outgoing messages are always re-signed with this channel's key before
/// they are written. Incoming messages are returned as decoded; callers
/// decide what a bad signature means through [`Channel::authenticate`].
pub struct Channel<S> {
    stream: S,
    key: SessionKey,
    config: ChannelConfig,
}

impl<S> std::fmt::Debug for Channel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S> Channel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the handshake on `stream` and wrap it.
    ///
    /// On failure the stream is dropped with the error; no partial session
    /// is ever returned.
    pub async fn establish(
        mut stream: S,
        role: Role,
        config: ChannelConfig,
    ) -> Result<Self, HandshakeError> {
        let key = tokio::time::timeout(
            config.handshake_timeout,
            handshake::establish(&mut stream, role, config.max_frame_size),
        )
        .await
        .map_err(|_| HandshakeError::Timeout)??;

        Ok(Self {
            stream,
            key,
            config,
        })
    }

    /// Wrap a stream with an already agreed key.
    pub fn with_key(stream: S, key: SessionKey, config: ChannelConfig) -> Self {
        Self {
            stream,
            key,
            config,
        }
    }

    /// Receive a request. `Ok(None)` means the peer closed cleanly.
    pub async fn recv_request(&mut self) -> ChannelResult<Option<Request>> {
        match self.recv_frame().await? {
            Some(bytes) => Ok(Some(Request::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Receive a response. `Ok(None)` means the peer closed cleanly.
    pub async fn recv_response(&mut self) -> ChannelResult<Option<Response>> {
        match self.recv_frame().await? {
            Some(bytes) => Ok(Some(Response::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Sign a request with this channel's key and send it.
    pub async fn send_request(&mut self, mut request: Request) -> ChannelResult<()> {
        auth::seal(&mut request, &self.key);
        let bytes = request.to_bytes()?;
        self.send_frame(&bytes).await
    }

    /// Sign a response with this channel's key and send it.
    pub async fn send_response(&mut self, mut response: Response) -> ChannelResult<()> {
        auth::seal(&mut response, &self.key);
        let bytes = response.to_bytes()?;
        self.send_frame(&bytes).await
    }

    /// Check that a received message was signed under this channel's key.
    pub fn authenticate<M: Signable>(&self, message: &M) -> Result<(), AuthError> {
        auth::check(message, &self.key)
    }

    /// The negotiated session key.
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Limits in effect on this channel.
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Shut down the write half so the peer sees a clean close.
    pub async fn close(&mut self) {
        if let Err(e) = self.stream.shutdown().await {
            tracing::debug!("Shutdown failed: {}", e);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Mutably borrow the underlying stream.
    ///
    /// Writing to it directly bypasses framing and signing.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, FrameError> {
        let read = read_frame(&mut self.stream, self.config.max_frame_size);
        match self.config.idle_timeout {
            Some(limit) => tokio::time::timeout(limit, read)
                .await
                .map_err(|_| FrameError::Timeout)?,
            None => read.await,
        }
    }

    async fn send_frame(&mut self, bytes: &[u8]) -> ChannelResult<()> {
        write_frame(&mut self.stream, bytes, self.config.max_frame_size).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChannelError;
    use channel_types::{Command, Status};
    use tokio::io::{duplex, DuplexStream};

    async fn pair() -> (Channel<DuplexStream>, Channel<DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        let config = ChannelConfig::default();
        let (client, server) = tokio::join!(
            Channel::establish(a, Role::Initiator, config),
            Channel::establish(b, Role::Responder, config),
        );
        (client.unwrap(), server.unwrap())
    }

    #[tokio::test]
    async fn signed_request_verifies_on_the_other_end() {
        let (mut client, mut server) = pair().await;
        let request = Request::new(Command::Get, "/", "7421", "hostA", vec![]);
        client.send_request(request).await.unwrap();

        let received = server.recv_request().await.unwrap().unwrap();
        assert!(server.authenticate(&received).is_ok());
        assert_eq!(received.url, "/");
    }

    #[tokio::test]
    async fn response_roundtrip_over_channel() {
        let (mut client, mut server) = pair().await;
        let response = Response::new(Status::NotFound, "origin").with_url("x");
        server.send_response(response).await.unwrap();

        let received = client.recv_response().await.unwrap().unwrap();
        assert!(client.authenticate(&received).is_ok());
        assert_eq!(received.status, Status::NotFound);
    }

    #[tokio::test]
    async fn send_overwrites_any_existing_signature() {
        let (mut client, mut server) = pair().await;
        let mut request = Request::new(Command::Get, "/", "1", "h", vec![]);
        request.signature = "forged".into();
        client.send_request(request).await.unwrap();

        let received = server.recv_request().await.unwrap().unwrap();
        assert_ne!(received.signature, "forged");
        assert!(server.authenticate(&received).is_ok());
    }

    #[tokio::test]
    async fn tampered_request_fails_authentication() {
        let (a, mut b) = duplex(64 * 1024);
        let key = SessionKey::random();
        let mut server = Channel::with_key(a, key.clone(), ChannelConfig::default());

        let mut request = Request::new(Command::Delete, "notes.txt", "7421", "hostA", vec![]);
        auth::seal(&mut request, &key);
        request.client_id = "9001".into();
        write_frame(&mut b, &request.to_bytes().unwrap(), DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();

        let received = server.recv_request().await.unwrap().unwrap();
        assert_eq!(
            server.authenticate(&received),
            Err(AuthError::InvalidSignature)
        );
    }

    #[tokio::test]
    async fn peer_close_is_none() {
        let (mut client, server) = pair().await;
        drop(server);
        assert!(client.recv_response().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn garbage_payload_is_decode_error() {
        let (a, mut b) = duplex(1024);
        let mut server = Channel::with_key(a, SessionKey::random(), ChannelConfig::default());
        write_frame(&mut b, b"\xc1not msgpack", DEFAULT_MAX_FRAME_SIZE)
            .await
            .unwrap();
        assert!(matches!(
            server.recv_request().await,
            Err(ChannelError::Wire(_))
        ));
    }

    #[tokio::test]
    async fn idle_timeout_fires() {
        let (a, _b) = duplex(1024);
        let config = ChannelConfig {
            idle_timeout: Some(Duration::from_millis(20)),
            ..ChannelConfig::default()
        };
        let mut server = Channel::with_key(a, SessionKey::random(), config);
        assert!(matches!(
            server.recv_request().await,
            Err(ChannelError::Frame(FrameError::Timeout))
        ));
    }

    #[tokio::test]
    async fn silent_peer_times_out_handshake() {
        let (a, _b) = duplex(1024);
        let config = ChannelConfig {
            handshake_timeout: Duration::from_millis(20),
            ..ChannelConfig::default()
        };
        let result = Channel::establish(a, Role::Responder, config).await;
        assert!(matches!(result, Err(HandshakeError::Timeout)));
    }
}
