//! Origin server: listener, admission and per-connection sessions.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use channel_net::{
    serve_connections, Admission, ChannelConfig, ConnectionHandler, RateLimitError, ServerHandle,
};
use tokio::net::{TcpListener, TcpStream};

use crate::config::{Config, StorageBackend};
use crate::error::Result;
use crate::router::Router;
use crate::session::OriginSession;
use crate::store::{ContentStore, FsStore, MemoryStore};

/// Operational counters for the origin.
///
/// All counters are monotonically increasing (reset only on restart).
#[derive(Debug, Default)]
pub struct OriginMetrics {
    /// Connections admitted.
    pub connections_total: AtomicU64,
    /// Handshakes that failed or timed out.
    pub handshake_failures: AtomicU64,
    /// Requests received on established sessions.
    pub requests_total: AtomicU64,
    /// Requests answered FAIL-401 for a bad signature.
    pub auth_failures: AtomicU64,
    /// Connections turned away by admission control.
    pub rate_limit_hits: AtomicU64,
}

impl OriginMetrics {
    fn log_summary(&self) {
        tracing::info!(
            "Origin metrics: connections={} handshake_failures={} requests={} auth_failures={} rate_limited={}",
            self.connections_total.load(Ordering::Relaxed),
            self.handshake_failures.load(Ordering::Relaxed),
            self.requests_total.load(Ordering::Relaxed),
            self.auth_failures.load(Ordering::Relaxed),
            self.rate_limit_hits.load(Ordering::Relaxed),
        );
    }
}

#[derive(Clone)]
struct OriginHandler {
    router: Router,
    metrics: Arc<OriginMetrics>,
    channel_config: ChannelConfig,
}

impl ConnectionHandler for OriginHandler {
    async fn handle(&self, stream: TcpStream, peer: SocketAddr) {
        self.metrics.connections_total.fetch_add(1, Ordering::Relaxed);
        let _ = stream.set_nodelay(true);

        let session = match OriginSession::accept(
            stream,
            self.router.clone(),
            self.metrics.clone(),
            self.channel_config,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                self.metrics.handshake_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Handshake with {} failed: {}", peer, e);
                return;
            }
        };

        tracing::info!("Session established with {}", peer);
        match session.run().await {
            Ok(()) => tracing::debug!("Session with {} closed", peer),
            Err(e) => tracing::warn!("Session with {} ended: {}", peer, e),
        }
    }

    fn rejected(&self, peer: SocketAddr, reason: &RateLimitError) {
        self.metrics.rate_limit_hits.fetch_add(1, Ordering::Relaxed);
        tracing::warn!("Rejected connection from {}: {}", peer, reason);
    }
}

/// A bound origin, ready to serve.
pub struct OriginServer {
    listener: TcpListener,
    admission: Admission,
    handler: OriginHandler,
}

impl std::fmt::Debug for OriginServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OriginServer")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("admission", &self.admission)
            .field("metrics", &self.handler.metrics)
            .finish_non_exhaustive()
    }
}

impl OriginServer {
    /// Open the configured store and bind the listen address.
    pub async fn bind(config: &Config) -> Result<Self> {
        let store: Arc<dyn ContentStore> = match config.storage.backend {
            StorageBackend::Fs => Arc::new(FsStore::open(&config.storage.root).await?),
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory store; objects are lost on exit");
                Arc::new(MemoryStore::new())
            }
        };
        Self::with_store(config, store).await
    }

    /// Bind the listen address and serve from an existing store.
    pub async fn with_store(config: &Config, store: Arc<dyn ContentStore>) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.bind_address).await?;
        tracing::info!("Origin listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            admission: Admission::new(&config.limits),
            handler: OriginHandler {
                router: Router::new(store, config.server.server_info.clone()),
                metrics: Arc::new(OriginMetrics::default()),
                channel_config: config.limits.channel_config(),
            },
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared metrics handle.
    pub fn metrics(&self) -> Arc<OriginMetrics> {
        self.handler.metrics.clone()
    }

    /// Serve connections until `shutdown` resolves.
    pub async fn serve_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let metrics = self.handler.metrics.clone();
        serve_connections(self.listener, self.admission, self.handler, shutdown).await;
        metrics.log_summary();
    }
}

/// Start a filesystem-backed origin on `listen_addr` with default limits.
///
/// The returned handle stops the server when shut down or dropped.
pub async fn start_origin(
    listen_addr: SocketAddr,
    store_root: impl Into<PathBuf>,
) -> Result<ServerHandle> {
    let mut config = Config::default();
    config.server.bind_address = listen_addr.to_string();
    config.storage.root = store_root.into();
    config.storage.backend = StorageBackend::Fs;

    let server = OriginServer::bind(&config).await?;
    let local_addr = server.local_addr()?;
    Ok(ServerHandle::spawn(local_addr, |stopped| {
        server.serve_until(async move {
            let _ = stopped.await;
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_core::Role;
    use channel_net::Channel;
    use channel_types::{Command, Request, Response, Status};
    use tempfile::TempDir;

    async fn connect(addr: SocketAddr) -> Channel<TcpStream> {
        let stream = TcpStream::connect(addr).await.unwrap();
        Channel::establish(stream, Role::Initiator, ChannelConfig::default())
            .await
            .unwrap()
    }

    async fn roundtrip(channel: &mut Channel<TcpStream>, request: Request) -> Response {
        channel.send_request(request).await.unwrap();
        let response = channel.recv_response().await.unwrap().unwrap();
        channel.authenticate(&response).unwrap();
        response
    }

    #[tokio::test]
    async fn start_origin_serves_from_disk() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index"), b"welcome").unwrap();
        let origin = start_origin("127.0.0.1:0".parse().unwrap(), dir.path())
            .await
            .unwrap();

        let mut channel = connect(origin.local_addr()).await;
        let response = roundtrip(
            &mut channel,
            Request::new(Command::Get, "/", "1", "h", Vec::new()),
        )
        .await;
        assert_eq!(response.status, Status::Ok);
        assert_eq!(response.content, b"welcome");

        let response = roundtrip(
            &mut channel,
            Request::new(Command::Post, "new", "1", "h", b"data".to_vec()),
        )
        .await;
        assert_eq!(response.status, Status::Ok);
        assert_eq!(std::fs::read(dir.path().join("new")).unwrap(), b"data");

        drop(channel);
        origin.shutdown().await;
    }

    #[tokio::test]
    async fn sessions_do_not_share_keys() {
        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1:0".into();
        config.storage.backend = StorageBackend::Memory;
        let server = OriginServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let metrics = server.metrics();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_until(async move {
            let _ = stopped.await;
        }));

        let a = connect(addr).await;
        let b = connect(addr).await;
        assert_ne!(a.key().as_bytes(), b.key().as_bytes());

        drop((a, b));
        stop.send(()).unwrap();
        task.await.unwrap();
        assert_eq!(metrics.connections_total.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn failed_handshake_is_counted() {
        let mut config = Config::default();
        config.server.bind_address = "127.0.0.1:0".into();
        config.storage.backend = StorageBackend::Memory;
        let server = OriginServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap();
        let metrics = server.metrics();
        let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_until(async move {
            let _ = stopped.await;
        }));

        // Connect and hang up without a key share.
        drop(TcpStream::connect(addr).await.unwrap());
        while metrics.handshake_failures.load(Ordering::Relaxed) == 0 {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        // The listener is unaffected.
        let _ok = connect(addr).await;

        stop.send(()).unwrap();
        task.await.unwrap();
    }
}
