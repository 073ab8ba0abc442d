//! Burst listener
//!
//! Receives burst datagrams, keeps one [`Connection`] per joined peer and
//! forwards admitted packets, in per-peer sequence order, to the inbound
//! queue. The listener is the only owner of its connection table.

use std::net::SocketAddr;
use std::time::Instant;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use super::{
    reconcile, Connection, ConnectionTable, Inbound, InboundSender, ListenerConfig,
    LivenessSweeper, Reconciliation, ShutdownSignal,
};
use crate::protocol::{
    validate, BurstFrame, CodecError, Packet, Request, BURST_SIZE, WINDOW_SIZE,
};

/// Listener errors
#[derive(Error, Debug)]
pub enum ListenerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Listener task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type ListenerResult<T> = Result<T, ListenerError>;

/// Receive-side protocol state machine
pub struct Listener {
    /// Listener configuration
    config: ListenerConfig,
    /// Joined peers
    connections: ConnectionTable,
    /// Timeout scan
    sweeper: LivenessSweeper,
    /// Outbound queue to the game loop
    queue: InboundSender,
}

impl Listener {
    /// Create a listener with an empty connection table
    pub fn new(config: ListenerConfig, queue: InboundSender) -> Self {
        let sweeper =
            LivenessSweeper::new(config.sweep_interval, config.peer_timeout, Instant::now());

        Self {
            config,
            connections: ConnectionTable::new(),
            sweeper,
            queue,
        }
    }

    pub fn connections(&self) -> &ConnectionTable {
        &self.connections
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// Decode, validate and process one received datagram
    pub fn handle_datagram(&mut self, datagram: &[u8], now: Instant) {
        let burst = match BurstFrame::decode(datagram) {
            Ok(burst) => burst,
            Err(CodecError::Incomplete { got, .. }) => {
                tracing::debug!("Incomplete burst - {} bytes", got);
                return;
            }
            Err(e) => {
                tracing::debug!("Malformed burst ignored: {}", e);
                return;
            }
        };

        if !validate(burst.header()) {
            tracing::debug!("Unknown burst ignored");
            return;
        }
        if burst.is_empty() {
            tracing::debug!(
                "Burst from {} without a newest packet ignored",
                burst.header().peer()
            );
            return;
        }

        self.handle_burst(&burst, now);
    }

    /// Reconcile a burst against its peer's cursor and dispatch the
    /// admitted packets, oldest first
    pub fn handle_burst(&mut self, burst: &BurstFrame, now: Instant) {
        let peer = burst.header().peer();

        // Without a connection only the newest packet matters: it may be a Join
        let count = match self.connections.get(peer) {
            None => 1,
            Some(conn) => {
                let newest = burst.header().sequence();
                match reconcile(conn.sequence(), newest, WINDOW_SIZE) {
                    Reconciliation::Stale { behind } => {
                        tracing::debug!(
                            "Old burst from {} ignored, {} behind expected {}",
                            peer,
                            behind,
                            conn.sequence().saturating_add(1)
                        );
                        return;
                    }
                    Reconciliation::Idle => return,
                    Reconciliation::Admit(count) => {
                        if count > 1 {
                            tracing::warn!(
                                "Gap detected: {}, got - {}, expected - {}, recovering {} packets",
                                peer,
                                newest,
                                conn.sequence().saturating_add(1),
                                count - 1
                            );
                        }
                        count
                    }
                    Reconciliation::Overrun { gap } => {
                        tracing::warn!(
                            "{} has lost {} packets, connection will be terminated",
                            peer,
                            gap - 1
                        );
                        let sequence = conn.sequence();
                        self.connections.remove(peer);
                        self.forward(Packet::synthetic_leave(peer, sequence));
                        return;
                    }
                }
            }
        };

        for slot in burst.recovered(count) {
            match slot {
                Some(packet) => self.dispatch(peer, packet, now),
                None => tracing::debug!("Missing slot in burst from {}", peer),
            }
        }
    }

    /// Apply one admitted packet to the connection table
    fn dispatch(&mut self, peer: &str, packet: &Packet, now: Instant) {
        let header = packet.header();

        if !validate(header) {
            tracing::debug!("Unknown packet ignored");
            return;
        }
        if header.peer() != peer {
            tracing::debug!(
                "Packet for {} inside burst from {} ignored",
                header.peer(),
                peer
            );
            return;
        }

        if header.request() == Request::Join {
            if let Some(conn) = self.connections.get_mut(peer) {
                // Re-announced Join: keep the peer alive, never move the cursor back
                if header.sequence() > conn.sequence() {
                    conn.update(header.sequence(), now);
                }
                tracing::debug!("{} already joined", peer);
                return;
            }

            self.connections
                .join(Connection::new(peer, header.sequence(), now));
            tracing::info!("{} joined at sequence {}", peer, header.sequence());
            self.forward(packet.clone());
            return;
        }

        let Some(conn) = self.connections.get_mut(peer) else {
            tracing::trace!("{} sent {} without joining", peer, header.request());
            return;
        };

        // A reordered or corrupt interior slot must never move the cursor back
        if header.sequence() <= conn.sequence() {
            tracing::debug!(
                "Out of order packet from {} skipped: {} <= {}",
                peer,
                header.sequence(),
                conn.sequence()
            );
            return;
        }
        if header.sequence() != conn.sequence() + 1 {
            tracing::warn!(
                "Gap detected: {}, got - {}, expected - {}",
                peer,
                header.sequence(),
                conn.sequence() + 1
            );
        }
        conn.update(header.sequence(), now);

        match header.request() {
            Request::Leave => {
                self.connections.remove(peer);
                tracing::info!("{} left", peer);
            }
            Request::HeartBeat => {
                tracing::trace!("Heartbeat from {}", peer);
            }
            _ => {}
        }

        if header.request().is_forwarded() {
            tracing::debug!("{} sent {}", peer, header.request());
            self.forward(packet.clone());
        }
    }

    /// Run the liveness sweep if its interval has elapsed
    pub fn sweep(&mut self, now: Instant) {
        for conn in self.sweeper.poll(&mut self.connections, now) {
            tracing::info!(
                "{} timed out after {:?} (limit {:?}), connection terminated",
                conn.peer(),
                conn.idle_time(now),
                self.sweeper.timeout()
            );
            self.forward(Packet::synthetic_leave(conn.peer(), conn.sequence()));
        }
    }

    /// Non-blocking enqueue to the consumer
    fn forward(&self, packet: Packet) {
        let peer = packet.header().peer().to_string();
        if self.queue.send(Inbound { peer, packet }).is_err() {
            tracing::debug!("Inbound queue closed, packet dropped");
        }
    }

    /// Receive loop.
    ///
    /// The cancellation flag is checked right before and right after the
    /// bounded receive, so the loop exits within one `recv_wait`. A receive
    /// never outlasts the next due sweep.
    pub async fn run(mut self, socket: UdpSocket, shutdown: ShutdownSignal) {
        // One spare byte so oversized datagrams are seen as such
        let mut buf = vec![0u8; BURST_SIZE + 1];

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let wait = self
                .config
                .recv_wait
                .min(self.sweeper.next_due(Instant::now()));
            let received = tokio::time::timeout(wait, socket.recv_from(&mut buf)).await;

            if shutdown.is_cancelled() {
                break;
            }

            let now = Instant::now();
            self.sweep(now);

            match received {
                // Wait expired; the sweep above was the point
                Err(_) => continue,
                Ok(Err(e)) => {
                    tracing::warn!("Receive error: {}", e);
                }
                Ok(Ok((len, addr))) => {
                    tracing::trace!("{} bytes from {}", len, addr);
                    self.handle_datagram(&buf[..len], now);
                }
            }
        }

        tracing::info!(
            "Listener stopped with {} peers joined",
            self.connections.len()
        );
        for conn in self.connections.iter() {
            tracing::debug!(
                "{} still joined at sequence {}",
                conn.peer(),
                conn.sequence()
            );
        }
    }
}

/// A listener running on its own task
pub struct ListenerHandle {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Bind the configured port and start the receive loop
    pub async fn spawn(config: ListenerConfig, queue: InboundSender) -> ListenerResult<Self> {
        let bind_addr = config.bind_addr();
        let socket = UdpSocket::bind(&bind_addr).await.map_err(|e| {
            ListenerError::BindFailed(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        let local_addr = socket.local_addr()?;
        tracing::info!("Listener bound to {}", local_addr);

        let shutdown = ShutdownSignal::new();
        let listener = Listener::new(config, queue);
        let task = tokio::spawn(listener.run(socket, shutdown.clone()));

        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Cancellation flag of the running loop
    pub fn shutdown(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Signal the loop and wait for it to release the socket
    pub async fn stop(self) -> ListenerResult<()> {
        self.shutdown.cancel();
        self.task.await?;
        Ok(())
    }
}
