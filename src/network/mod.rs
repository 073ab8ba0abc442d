//! Network module - Burst transport over UDP
//!
//! Provides:
//! - Listener for receiving bursts and tracking joined peers
//! - Broadcaster for producing bursts
//! - Sequence reconciliation and liveness sweeping

mod broadcaster;
mod connection;
mod listener;
mod reconciler;
mod sweeper;

pub use broadcaster::*;
pub use connection::*;
pub use listener::*;
pub use reconciler::*;
pub use sweeper::*;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::protocol::Packet;

/// Runtime configuration for the listener
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Port to listen on
    pub port: u16,
    /// Interface to bind to
    pub bind_address: String,
    /// Upper bound on a single blocking receive
    pub recv_wait: Duration,
    /// Silence after which a peer is evicted
    pub peer_timeout: Duration,
    /// Minimum time between liveness sweeps
    pub sweep_interval: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            port: crate::protocol::DEFAULT_PORT,
            bind_address: "0.0.0.0".to_string(),
            recv_wait: Duration::from_millis(500),
            peer_timeout: Duration::from_millis(3000),
            sweep_interval: Duration::from_millis(1000),
        }
    }
}

impl ListenerConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Default::default()
        }
    }

    pub fn with_bind_address(mut self, bind_address: impl Into<String>) -> Self {
        self.bind_address = bind_address.into();
        self
    }

    pub fn with_timing(
        mut self,
        recv_wait: Duration,
        peer_timeout: Duration,
        sweep_interval: Duration,
    ) -> Self {
        self.recv_wait = recv_wait;
        self.peer_timeout = peer_timeout;
        self.sweep_interval = sweep_interval;
        self
    }

    /// Address string the socket binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl From<&crate::config::NetworkConfig> for ListenerConfig {
    fn from(config: &crate::config::NetworkConfig) -> Self {
        Self {
            port: config.port,
            bind_address: config
                .bind_address
                .clone()
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            recv_wait: Duration::from_millis(config.recv_wait_ms),
            peer_timeout: Duration::from_millis(config.peer_timeout_ms),
            sweep_interval: Duration::from_millis(config.sweep_interval_ms),
        }
    }
}

/// A packet admitted by the listener, tagged with its sender
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub peer: String,
    pub packet: Packet,
}

/// Producer half of the outbound queue
pub type InboundSender = mpsc::UnboundedSender<Inbound>;

/// Consumer half of the outbound queue
pub type InboundReceiver = mpsc::UnboundedReceiver<Inbound>;

/// Create the queue between the listener and the game loop
pub fn inbound_queue() -> (InboundSender, InboundReceiver) {
    mpsc::unbounded_channel()
}

/// Cooperative cancellation flag shared with the listener loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    cancelled: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at its next checkpoint
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Resolve `host` or `host:port` to a socket address
pub async fn resolve_target(target: &str, default_port: u16) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = if target.contains(':') {
        target.to_string()
    } else {
        format!("{}:{}", target, default_port)
    };
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", target),
        )
    })
}
