//! Burstnet - Burst-redundant UDP game-state synchronization
//!
//! Every datagram carries the sender's most recent packets, newest first.
//! A receiver recovers any loss shorter than the burst window, delivers
//! packets in strict per-peer order and drops peers that overrun the window
//! or go silent.

pub mod config;
pub mod network;
pub mod protocol;

pub use network::{
    inbound_queue, Broadcaster, Inbound, InboundReceiver, Listener, ListenerConfig,
    ListenerHandle, ShutdownSignal,
};
pub use protocol::{BurstFrame, GameUpdate, Packet, PacketHeader, Request};
