//! Connection admission for securechannel servers.
//!
//! Provides protection against connection flooding:
//! - a per-IP connection rate (governor keyed limiter backed by DashMap)
//! - a cap on concurrently running sessions
//!
//! Session slots are RAII guards, so a session task that is aborted during
//! shutdown still gives its slot back.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use serde::Deserialize;
use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::channel::ChannelConfig;
use crate::frame::DEFAULT_MAX_FRAME_SIZE;

/// Type alias for a keyed rate limiter using DashMap.
type KeyedLimiter<K> = RateLimiter<
    K,
    dashmap::DashMap<K, InMemoryState>,
    DefaultClock,
    NoOpMiddleware<governor::clock::QuantaInstant>,
>;

/// Limits shared by the relay and the origin.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum new connections per IP address per minute; 0 disables (default: 60).
    #[serde(default = "default_connections_per_ip")]
    pub connections_per_ip: u32,
    /// Maximum sessions running at once (default: 1024).
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    /// Seconds allowed for the key agreement handshake (default: 10).
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    /// Seconds a session may sit idle between requests; 0 disables (default: 300).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Largest accepted frame in bytes (default: 16 MiB).
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

fn default_connections_per_ip() -> u32 {
    60
}

fn default_max_concurrent_sessions() -> usize {
    1024
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_max_frame_size() -> usize {
    DEFAULT_MAX_FRAME_SIZE
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            connections_per_ip: default_connections_per_ip(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            idle_timeout_secs: default_idle_timeout_secs(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl LimitsConfig {
    /// Per-connection settings derived from these limits.
    pub fn channel_config(&self) -> ChannelConfig {
        ChannelConfig {
            max_frame_size: self.max_frame_size,
            handshake_timeout: Duration::from_secs(self.handshake_timeout_secs),
            idle_timeout: match self.idle_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Admission control for incoming connections.
#[derive(Clone)]
pub struct Admission {
    /// Limits connection attempts per source IP (`None` = unlimited).
    connection_limiter: Option<Arc<KeyedLimiter<IpAddr>>>,
    /// Sessions currently holding a slot.
    active: Arc<AtomicUsize>,
    max_sessions: usize,
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field(
                "connection_limiter",
                &self.connection_limiter.as_ref().map(|_| "KeyedLimiter<IpAddr>"),
            )
            .field("active", &self.active.load(Ordering::Relaxed))
            .field("max_sessions", &self.max_sessions)
            .finish()
    }
}

impl Admission {
    /// Create admission control from configuration.
    ///
    /// A `connections_per_ip` of zero turns the per-IP limit off.
    pub fn new(config: &LimitsConfig) -> Self {
        let connection_limiter: Option<Arc<KeyedLimiter<IpAddr>>> =
            NonZeroU32::new(config.connections_per_ip)
                .map(|per_minute| Arc::new(RateLimiter::keyed(Quota::per_minute(per_minute))));
        Self {
            connection_limiter,
            active: Arc::new(AtomicUsize::new(0)),
            max_sessions: config.max_concurrent_sessions,
        }
    }

    /// Check the per-IP rate, then take a session slot.
    pub fn admit(&self, ip: IpAddr) -> Result<SessionSlot, RateLimitError> {
        if let Some(limiter) = &self.connection_limiter {
            limiter
                .check_key(&ip)
                .map_err(|_| RateLimitError::ConnectionLimitExceeded)?;
        }
        self.try_acquire()
            .ok_or(RateLimitError::TooManySessions(self.max_sessions))
    }

    /// Number of sessions currently holding a slot.
    pub fn active_sessions(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Evict rate limiter entries for idle addresses.
    pub fn shrink(&self) {
        if let Some(limiter) = &self.connection_limiter {
            limiter.retain_recent();
        }
    }

    fn try_acquire(&self) -> Option<SessionSlot> {
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < self.max_sessions).then_some(n + 1)
            })
            .ok()
            .map(|_| SessionSlot {
                active: self.active.clone(),
            })
    }
}

/// A held session slot; released on drop.
#[derive(Debug)]
pub struct SessionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for SessionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Admission rejections.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateLimitError {
    /// Too many connection attempts from this address.
    #[error("connection rate limit exceeded")]
    ConnectionLimitExceeded,
    /// Every session slot is taken.
    #[error("too many concurrent sessions (limit: {0})")]
    TooManySessions(usize),
}
