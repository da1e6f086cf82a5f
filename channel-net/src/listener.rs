//! Shared accept loop for the relay and the origin.
//!
//! One task per accepted connection, tracked in a `JoinSet`. When the
//! shutdown future resolves the listener stops accepting and every running
//! session task is aborted, which drops its sockets.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

use crate::limits::{Admission, RateLimitError};

/// How often idle rate limiter entries are evicted.
const SHRINK_INTERVAL: Duration = Duration::from_secs(60);

/// Per-connection entry point of a server role.
pub trait ConnectionHandler: Clone + Send + Sync + 'static {
    /// Serve one accepted connection until it ends.
    ///
    /// This is the outermost recovery point: implementations log their own
    /// failures and never let them escape.
    fn handle(&self, stream: TcpStream, peer: SocketAddr) -> impl Future<Output = ()> + Send;

    /// Called when admission control turns a connection away.
    fn rejected(&self, peer: SocketAddr, reason: &RateLimitError) {
        tracing::warn!("Rejected connection from {}: {}", peer, reason);
    }
}

/// Accept connections until `shutdown` resolves.
pub async fn serve_connections<H, F>(
    listener: TcpListener,
    admission: Admission,
    handler: H,
    shutdown: F,
) where
    H: ConnectionHandler,
    F: Future<Output = ()>,
{
    let mut tasks = JoinSet::new();
    let mut shrink = tokio::time::interval(SHRINK_INTERVAL);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, closing {} sessions", tasks.len());
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        // EMFILE and friends: keep the listener alive
                        tracing::warn!("Accept failed: {}", e);
                        continue;
                    }
                };

                let slot = match admission.admit(peer.ip()) {
                    Ok(slot) => slot,
                    Err(reason) => {
                        handler.rejected(peer, &reason);
                        continue;
                    }
                };

                let handler = handler.clone();
                tasks.spawn(async move {
                    let _slot = slot;
                    handler.handle(stream, peer).await;
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!("Session task panicked: {}", e);
                    }
                }
            }
            _ = shrink.tick() => admission.shrink(),
        }
    }

    tasks.shutdown().await;
}

/// A server running on a background task.
///
/// Dropping the handle also stops the server.
#[derive(Debug)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Spawn `serve` with a shutdown future wired to this handle.
    pub fn spawn<S, Fut>(local_addr: SocketAddr, serve: S) -> Self
    where
        S: FnOnce(oneshot::Receiver<()>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel();
        Self {
            local_addr,
            stop: Some(stop),
            task: tokio::spawn(serve(stopped)),
        }
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, abort running sessions and wait for the server task.
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            if e.is_panic() {
                tracing::error!("Server task panicked: {}", e);
            }
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}
