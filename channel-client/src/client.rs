//! Client - connect, send signed requests, verify responses.

use channel_core::{AuthError, Role};
use channel_net::{Channel, ChannelConfig, ChannelError, HandshakeError};
use channel_types::{Command, Request, Response};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::identity::ClientIdentity;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not open the TCP connection.
    #[error("connection failed: {0}")]
    Connect(#[source] std::io::Error),

    /// Key agreement failed.
    #[error("handshake failed: {0}")]
    Handshake(#[from] HandshakeError),

    /// Sending or receiving failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// A response did not verify under the session key.
    #[error("response rejected: {0}")]
    Authentication(#[from] AuthError),

    /// The server closed the connection before answering.
    #[error("connection closed by server")]
    Closed,
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// A connected client.
///
/// Requests are strictly sequential: each call waits for its response
/// before returning.
pub struct Client<S = TcpStream> {
    channel: Channel<S>,
    identity: ClientIdentity,
}

impl<S> std::fmt::Debug for Client<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.identity)
            .field("channel", &self.channel)
            .finish()
    }
}

impl Client<TcpStream> {
    /// Connect to a relay or origin with default channel settings.
    pub async fn connect(addr: impl ToSocketAddrs, identity: ClientIdentity) -> Result<Self> {
        Self::connect_with(addr, identity, ChannelConfig::default()).await
    }

    /// Connect with explicit channel settings.
    pub async fn connect_with(
        addr: impl ToSocketAddrs,
        identity: ClientIdentity,
        config: ChannelConfig,
    ) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(ClientError::Connect)?;
        let _ = stream.set_nodelay(true);
        let client = Self::handshake(stream, identity, config).await?;
        tracing::debug!("Connected to {:?}", client.channel.get_ref().peer_addr().ok());
        Ok(client)
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the initiator handshake over an existing stream.
    pub async fn handshake(
        stream: S,
        identity: ClientIdentity,
        config: ChannelConfig,
    ) -> Result<Self> {
        let channel = Channel::establish(stream, Role::Initiator, config).await?;
        Ok(Self { channel, identity })
    }

    /// The identity stamped on requests.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Fetch an object.
    pub async fn get(&mut self, url: &str) -> Result<Response> {
        self.send(Command::Get, url, Vec::new()).await
    }

    /// Create an object owned by this client's identity.
    pub async fn post(&mut self, url: &str, content: impl Into<Vec<u8>>) -> Result<Response> {
        self.send(Command::Post, url, content.into()).await
    }

    /// Delete an object this client's identity created.
    pub async fn delete(&mut self, url: &str) -> Result<Response> {
        self.send(Command::Delete, url, Vec::new()).await
    }

    /// Send any command and wait for the verified response.
    ///
    /// Status codes other than OK are returned as responses, not errors.
    pub async fn send(&mut self, command: Command, url: &str, content: Vec<u8>) -> Result<Response> {
        let request = Request::new(
            command,
            url,
            self.identity.client_id.clone(),
            self.identity.client_info.clone(),
            content,
        );
        self.channel.send_request(request).await?;

        let response = self.channel.recv_response().await?.ok_or(ClientError::Closed)?;
        self.channel.authenticate(&response)?;
        tracing::debug!("{} -> {} ({} bytes)", url, response.status, response.content.len());
        Ok(response)
    }

    /// Close the connection cleanly.
    pub async fn close(mut self) {
        self.channel.close().await;
    }
}
