//! Protocol module - Defines the burst wire protocol
//!
//! Every datagram is a fixed-size burst frame:
//! - 48 byte header (copy of the newest packet's header)
//! - `WINDOW_SIZE` packet slots, newest first
//!
//! Each packet slot is a header followed by a length-prefixed,
//! zero-padded payload of `PAYLOAD_SIZE` bytes.

mod burst;
mod codec;
mod message;
mod update;

pub use burst::*;
pub use codec::*;
pub use message::*;
pub use update::*;

/// Protocol version for compatibility checking
pub const PROTOCOL_VERSION: u8 = 1;

/// Default UDP port for burst traffic
pub const DEFAULT_PORT: u16 = 11011;

/// Magic bytes for protocol identification
pub const MAGIC_BYTES: [u8; 4] = *b"BRST";

/// Number of most recent packets carried by every burst.
///
/// This bounds the number of consecutive lost packets a receiver can recover.
pub const WINDOW_SIZE: usize = 10;

/// Fixed payload capacity of a single packet
pub const PAYLOAD_SIZE: usize = 320;

/// Maximum peer name length in bytes (UTF-8)
pub const PEER_NAME_MAX: usize = 32;

/// Header size: magic(4) + version(1) + request(1) + name_len(1) + reserved(1)
/// + name(32) + sequence(8) = 48 bytes
pub const HEADER_SIZE: usize = 4 + 1 + 1 + 1 + 1 + PEER_NAME_MAX + 8;

/// Packet size: header + payload length(2) + payload
pub const PACKET_SIZE: usize = HEADER_SIZE + 2 + PAYLOAD_SIZE;

/// Size of every burst datagram on the wire
pub const BURST_SIZE: usize = HEADER_SIZE + WINDOW_SIZE * PACKET_SIZE;
