//! Relay server: client listener, origin dialing and per-client sessions.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use channel_net::{
    serve_connections, Admission, ChannelConfig, ConnectionHandler, RateLimitError, ServerHandle,
};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::session::{redial, RelaySession};

/// Operational metrics for the relay.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Client connections admitted.
    pub connections_total: AtomicU64,
    /// Sessions with both legs established.
    pub sessions_established: AtomicU64,
    /// Requests forwarded and answered by the origin.
    pub requests_forwarded: AtomicU64,
    /// Client requests answered FAIL-401 for a bad signature.
    pub auth_failures: AtomicU64,
    /// Origin responses that failed verification.
    pub origin_auth_failures: AtomicU64,
    /// Origin connections reopened after the origin closed an idle leg.
    pub origin_redials: AtomicU64,
    /// Sessions that failed to establish (either leg).
    pub handshake_failures: AtomicU64,
    /// Connections turned away by admission control.
    pub rate_limit_hits: AtomicU64,
}

impl RelayMetrics {
    fn log_summary(&self) {
        tracing::info!(
            "Relay metrics: connections={} sessions={} forwarded={} auth_failures={} origin_auth_failures={} origin_redials={} handshake_failures={} rate_limited={}",
            self.connections_total.load(Ordering::Relaxed),
            self.sessions_established.load(Ordering::Relaxed),
            self.requests_forwarded.load(Ordering::Relaxed),
            self.auth_failures.load(Ordering::Relaxed),
            self.origin_auth_failures.load(Ordering::Relaxed),
            self.origin_redials.load(Ordering::Relaxed),
            self.handshake_failures.load(Ordering::Relaxed),
            self.rate_limit_hits.load(Ordering::Relaxed),
        );
    }
}

#[derive(Clone)]
struct RelayHandler {
    origin_address: Arc<str>,
    server_info: Arc<str>,
    metrics: Arc<RelayMetrics>,
    channel_config: ChannelConfig,
}

impl RelayHandler {
    async fn dial_origin(&self) -> Result<TcpStream> {
        let connect = TcpStream::connect(&*self.origin_address);
        let stream = tokio::time::timeout(self.channel_config.handshake_timeout, connect)
            .await
            .map_err(|_| {
                RelayError::unreachable(
                    &*self.origin_address,
                    std::io::ErrorKind::TimedOut.into(),
                )
            })?
            .map_err(|e| RelayError::unreachable(&*self.origin_address, e))?;
        let _ = stream.set_nodelay(true);
        Ok(stream)
    }

    async fn open_session(
        &self,
        client: TcpStream,
    ) -> Result<RelaySession<TcpStream, TcpStream>> {
        let origin = self.dial_origin().await?;
        let session = RelaySession::establish(
            client,
            origin,
            self.channel_config,
            self.metrics.clone(),
            &*self.server_info,
        )
        .await?;

        let handler = self.clone();
        Ok(session.with_redial(redial(move || {
            let handler = handler.clone();
            async move { handler.dial_origin().await }
        })))
    }
}

impl ConnectionHandler for RelayHandler {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        tracing::info!("New connection from {}", peer);
        let _ = stream.set_nodelay(true);

        let session = match self.open_session(stream).await {
            Ok(session) => session,
            Err(e) => {
                self.metrics.handshake_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Could not establish session for {}: {}", peer, e);
                return;
            }
        };

        self.metrics.sessions_established.fetch_add(1, Ordering::Relaxed);
        tracing::info!("Session established for {}", peer);
        match session.run().await {
            Ok(()) => tracing::debug!("Session for {} closed", peer),
            Err(e) => tracing::warn!("Session for {} ended: {}", peer, e),
        }
    }

    fn rejected(&self, peer: SocketAddr, reason: &RateLimitError) {
        self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Rejected connection from {}: {}", peer, reason);
    }
}

/// A bound relay, ready to serve.
pub struct RelayServer {
    listener: TcpListener,
    admission: Admission,
    handler: RelayHandler,
}

impl std::fmt::Debug for RelayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("origin_address", &self.handler.origin_address)
            .field("admission", &self.admission)
            .field("metrics", &self.handler.metrics)
            .finish_non_exhaustive()
    }
}

impl RelayServer {
    /// Bind the client-facing listen address.
    ///
    /// The origin is dialed per session, so it need not be up yet.
    pub async fn bind(config: &Config) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.bind_address).await?;
        tracing::info!(
            "Relay listening on {}, forwarding to {}",
            listener.local_addr()?,
            config.server.origin_address
        );

        Ok(Self {
            listener,
            admission: Admission::new(&config.limits),
            handler: RelayHandler {
                origin_address: config.server.origin_address.as_str().into(),
                server_info: config.server.server_info.as_str().into(),
                metrics: Arc::new(RelayMetrics::default()),
                channel_config: config.limits.channel_config(),
            },
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> Arc<RelayMetrics> {
        self.handler.metrics.clone()
    }

    /// Serve clients until `shutdown` resolves.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let metrics = self.handler.metrics.clone();
        serve_connections(self.listener, self.admission, self.handler, shutdown).await;
        metrics.log_summary();
    }
}

/// Start a relay on `client_listen_addr` forwarding to `origin_addr`, with
/// default limits.
///
/// The returned handle stops the relay when shut down or dropped.
pub async fn start_relay(
    client_listen_addr: SocketAddr,
    origin_addr: SocketAddr,
) -> Result<ServerHandle> {
    let mut config = Config::default();
    config.server.bind_address = client_listen_addr.to_string();
    config.server.origin_address = origin_addr.to_string();

    let server = RelayServer::bind(&config).await?;
    let local_addr = server.local_addr()?;
    Ok(ServerHandle::spawn(local_addr, |stopped| {
        server.serve_until(async move {
            let _ = stopped.await;
        })
    }))
}
