//! Protocol message definitions
//!
//! Defines the packet header, the request kinds and the immutable packet
//! carried inside every burst slot.

use bytes::Bytes;
use std::fmt;

use super::{CodecError, MAGIC_BYTES, PAYLOAD_SIZE, PEER_NAME_MAX, PROTOCOL_VERSION};

/// What a packet asks the receiver to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Request {
    /// Announce a new peer
    Join = 1,
    /// Graceful departure
    Leave = 2,
    /// Keep-alive, never forwarded to the consumer
    HeartBeat = 3,
    /// Game-state update payload
    Data = 4,
}

impl Request {
    /// Get the wire identifier
    pub fn type_id(self) -> u8 {
        self as u8
    }

    /// Whether the consumer should see packets of this kind
    pub fn is_forwarded(self) -> bool {
        !matches!(self, Request::HeartBeat)
    }
}

impl TryFrom<u8> for Request {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Request::Join),
            2 => Ok(Request::Leave),
            3 => Ok(Request::HeartBeat),
            4 => Ok(Request::Data),
            other => Err(CodecError::UnknownRequest(other)),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Request::Join => "Join",
            Request::Leave => "Leave",
            Request::HeartBeat => "HeartBeat",
            Request::Data => "Data",
        };
        f.write_str(name)
    }
}

/// Header shared by every packet and by the burst frame itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    /// Protocol magic as received
    pub(crate) signature: [u8; 4],
    /// Protocol version as received
    pub(crate) version: u8,
    /// Sender identity
    pub(crate) peer: String,
    /// Per-peer sequence number
    pub(crate) sequence: u64,
    /// Request kind
    pub(crate) request: Request,
}

impl PacketHeader {
    /// Create a header stamped with the local protocol magic and version
    pub fn new(peer: &str, sequence: u64, request: Request) -> Result<Self, CodecError> {
        if peer.is_empty() || peer.len() > PEER_NAME_MAX {
            return Err(CodecError::InvalidPeerName);
        }
        Ok(Self {
            signature: MAGIC_BYTES,
            version: PROTOCOL_VERSION,
            peer: peer.to_string(),
            sequence,
            request,
        })
    }

    /// Whether the header carries our magic and protocol version
    pub fn is_valid(&self) -> bool {
        self.signature == MAGIC_BYTES && self.version == PROTOCOL_VERSION
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn request(&self) -> Request {
        self.request
    }

    pub fn version(&self) -> u8 {
        self.version
    }
}

/// A single protocol message: header plus opaque payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    header: PacketHeader,
    payload: Bytes,
}

impl Packet {
    /// Create a packet, rejecting payloads that do not fit a slot
    pub fn new(header: PacketHeader, payload: Bytes) -> Result<Self, CodecError> {
        if payload.len() > PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(payload.len(), PAYLOAD_SIZE));
        }
        Ok(Self { header, payload })
    }

    /// Create a packet without a payload
    pub fn empty(header: PacketHeader) -> Self {
        Self {
            header,
            payload: Bytes::new(),
        }
    }

    /// Build the Leave this layer emits on a peer's behalf when it
    /// evicts the connection
    pub fn synthetic_leave(peer: &str, sequence: u64) -> Self {
        Self::empty(PacketHeader {
            signature: MAGIC_BYTES,
            version: PROTOCOL_VERSION,
            peer: peer.to_string(),
            sequence,
            request: Request::Leave,
        })
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_type_ids() {
        for request in [Request::Join, Request::Leave, Request::HeartBeat, Request::Data] {
            assert_eq!(Request::try_from(request.type_id()).unwrap(), request);
        }
        assert!(matches!(
            Request::try_from(0),
            Err(CodecError::UnknownRequest(0))
        ));
    }

    #[test]
    fn test_heartbeat_not_forwarded() {
        assert!(!Request::HeartBeat.is_forwarded());
        assert!(Request::Data.is_forwarded());
        assert!(Request::Leave.is_forwarded());
    }

    #[test]
    fn test_header_validation() {
        let mut header = PacketHeader::new("alice", 7, Request::Data).unwrap();
        assert!(header.is_valid());

        header.signature = *b"XXXX";
        assert!(!header.is_valid());

        header.signature = MAGIC_BYTES;
        header.version = PROTOCOL_VERSION + 1;
        assert!(!header.is_valid());
    }

    #[test]
    fn test_peer_name_limits() {
        assert!(PacketHeader::new("", 0, Request::Join).is_err());
        let long = "x".repeat(PEER_NAME_MAX + 1);
        assert!(PacketHeader::new(&long, 0, Request::Join).is_err());
        let max = "x".repeat(PEER_NAME_MAX);
        assert!(PacketHeader::new(&max, 0, Request::Join).is_ok());
    }

    #[test]
    fn test_payload_too_large() {
        let header = PacketHeader::new("alice", 1, Request::Data).unwrap();
        let payload = Bytes::from(vec![0u8; PAYLOAD_SIZE + 1]);
        assert!(matches!(
            Packet::new(header, payload),
            Err(CodecError::PayloadTooLarge(_, PAYLOAD_SIZE))
        ));
    }

    #[test]
    fn test_synthetic_leave() {
        let leave = Packet::synthetic_leave("bob", 42);
        assert!(leave.header().is_valid());
        assert_eq!(leave.header().request(), Request::Leave);
        assert_eq!(leave.header().sequence(), 42);
        assert!(leave.payload().is_empty());
    }
}
