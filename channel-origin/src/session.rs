//! Per-connection origin session.
//!
//! A session is created by a completed handshake and then answers one
//! request at a time: authenticate, route, sign, send. A request with a bad
//! signature gets FAIL-401 and the session carries on; a frame or decode
//! error ends it. A response too large for one frame is replaced by a
//! status-only answer instead of tearing the session down.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use channel_core::Role;
use channel_net::{Channel, ChannelConfig, ChannelError, FrameError};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;
use crate::router::Router;
use crate::server::OriginMetrics;

/// One client (or relay) connection to the origin.
pub struct OriginSession<S> {
    channel: Channel<S>,
    router: Router,
    metrics: Arc<OriginMetrics>,
}

impl<S> OriginSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Run the responder handshake on `stream`.
    pub async fn accept(
        stream: S,
        router: Router,
        metrics: Arc<OriginMetrics>,
        config: ChannelConfig,
    ) -> Result<Self> {
        let channel = Channel::establish(stream, Role::Responder, config).await?;
        Ok(Self {
            channel,
            router,
            metrics,
        })
    }

    /// Serve requests until the peer closes the connection.
    pub async fn run(mut self) -> Result<()> {
        while let Some(request) = self.channel.recv_request().await? {
            self.metrics.requests_total.fetch_add(1, Ordering::Relaxed);

            let response = match self.channel.authenticate(&request) {
                Ok(()) => self.router.route(&request).await,
                Err(e) => {
                    tracing::warn!("Rejected {} {}: {}", request.command, request.url, e);
                    self.metrics.auth_failures.fetch_add(1, Ordering::Relaxed);
                    self.router.unauthorized()
                }
            };

            let status = response.status;
            match self.channel.send_response(response).await {
                Err(ChannelError::Frame(FrameError::TooLarge { size, limit })) => {
                    tracing::warn!(
                        "Response to {} {} is {} bytes, over the {} byte frame limit",
                        request.command,
                        request.url,
                        size,
                        limit
                    );
                    let fallback = self.router.undeliverable(&request, status);
                    self.channel.send_response(fallback).await?;
                }
                result => result?,
            }
        }

        tracing::debug!("Peer closed the session");
        Ok(())
    }
}
