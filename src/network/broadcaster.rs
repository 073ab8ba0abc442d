//! Burst broadcaster
//!
//! The sending half of the protocol. Every produced packet gets the next
//! sequence number and is pushed into a [`BurstWindow`]; every transmission
//! sends the whole window to each target so receivers can recover losses.

use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::protocol::{
    BurstWindow, CodecError, GameUpdate, Packet, PacketHeader, Request, BURST_SIZE,
};

/// Broadcaster errors
#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Codec(#[from] CodecError),

    #[error("Nothing to send")]
    NothingToSend,
}

pub type BroadcasterResult<T> = Result<T, BroadcasterError>;

/// Transmission statistics
#[derive(Debug, Default, Clone)]
pub struct BroadcastStats {
    /// Packets produced
    pub packets_produced: u64,
    /// Burst datagrams sent (one per target)
    pub bursts_sent: u64,
    /// Bytes sent
    pub bytes_sent: u64,
    /// Failed sends
    pub send_errors: u64,
}

/// Produces and transmits bursts for one local peer
pub struct Broadcaster {
    /// Local peer identity
    peer: String,
    /// The UDP socket
    socket: UdpSocket,
    /// Listeners to send to
    targets: Vec<SocketAddr>,
    /// Sequence number of the next produced packet
    next_sequence: u64,
    /// Most recent packets
    window: BurstWindow,
    /// Write buffer
    write_buf: BytesMut,
    /// Statistics
    stats: BroadcastStats,
}

impl Broadcaster {
    /// Bind an ephemeral UDP port and prepare to send to `targets`
    pub async fn bind(peer: &str, targets: Vec<SocketAddr>) -> BroadcasterResult<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Self::with_socket(socket, peer, targets)
    }

    /// Use an already bound socket
    pub fn with_socket(
        socket: UdpSocket,
        peer: &str,
        targets: Vec<SocketAddr>,
    ) -> BroadcasterResult<Self> {
        // Reject bad names before anything is produced
        PacketHeader::new(peer, 0, Request::Join)?;

        Ok(Self {
            peer: peer.to_string(),
            socket,
            targets,
            next_sequence: 0,
            window: BurstWindow::new(),
            write_buf: BytesMut::with_capacity(BURST_SIZE),
            stats: BroadcastStats::default(),
        })
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn targets(&self) -> &[SocketAddr] {
        &self.targets
    }

    pub fn add_target(&mut self, target: SocketAddr) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    pub fn local_addr(&self) -> BroadcasterResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Sequence number of the most recently produced packet
    pub fn sequence(&self) -> Option<u64> {
        self.next_sequence.checked_sub(1)
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    /// Produce a packet without transmitting it.
    ///
    /// It goes out with the next [`flush`](Self::flush). Returns its
    /// sequence number.
    pub fn enqueue(&mut self, request: Request, payload: Bytes) -> BroadcasterResult<u64> {
        let sequence = self.next_sequence;
        let header = PacketHeader::new(&self.peer, sequence, request)?;
        let packet = Packet::new(header, payload)?;

        self.window.push(packet);
        self.next_sequence += 1;
        self.stats.packets_produced += 1;
        Ok(sequence)
    }

    /// Send the current burst to every target.
    ///
    /// Flushing without producing a packet re-announces the newest one.
    pub async fn flush(&mut self) -> BroadcasterResult<()> {
        let frame = self.window.frame().ok_or(BroadcasterError::NothingToSend)?;

        self.write_buf.clear();
        frame.encode(&mut self.write_buf);

        for target in &self.targets {
            match self.socket.send_to(&self.write_buf, target).await {
                Ok(n) => {
                    self.stats.bursts_sent += 1;
                    self.stats.bytes_sent += n as u64;
                }
                Err(e) => {
                    // A single unreachable target must not starve the others
                    self.stats.send_errors += 1;
                    tracing::warn!("Send to {} failed: {}", target, e);
                }
            }
        }

        Ok(())
    }

    async fn produce(&mut self, request: Request, payload: Bytes) -> BroadcasterResult<u64> {
        let sequence = self.enqueue(request, payload)?;
        self.flush().await?;
        tracing::trace!("{} sent {} #{}", self.peer, request, sequence);
        Ok(sequence)
    }

    /// Announce this peer
    pub async fn join(&mut self) -> BroadcasterResult<u64> {
        let sequence = self.produce(Request::Join, Bytes::new()).await?;
        tracing::info!("{} joining {} listener(s)", self.peer, self.targets.len());
        Ok(sequence)
    }

    /// Keep the connection alive
    pub async fn heartbeat(&mut self) -> BroadcasterResult<u64> {
        self.produce(Request::HeartBeat, Bytes::new()).await
    }

    /// Send a game-state update
    pub async fn send_update(&mut self, update: &GameUpdate) -> BroadcasterResult<u64> {
        let payload = update.to_payload()?;
        self.produce(Request::Data, payload).await
    }

    /// Send an opaque payload
    pub async fn send_payload(&mut self, payload: Bytes) -> BroadcasterResult<u64> {
        self.produce(Request::Data, payload).await
    }

    /// Re-send the current burst without producing a packet
    pub async fn resend(&mut self) -> BroadcasterResult<()> {
        self.flush().await
    }

    /// Leave gracefully.
    ///
    /// Sequence state is reset so a later [`join`](Self::join) starts over.
    pub async fn leave(&mut self) -> BroadcasterResult<u64> {
        let sequence = self.produce(Request::Leave, Bytes::new()).await?;
        tracing::info!("{} left", self.peer);

        self.window.clear();
        self.next_sequence = 0;
        Ok(sequence)
    }
}
