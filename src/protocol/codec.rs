//! Protocol codec for encoding/decoding packets
//!
//! Every field has a fixed width so a burst datagram always has the same
//! size. Decoding is purely structural; whether a header belongs to this
//! protocol is answered by [`validate`].

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::{
    Packet, PacketHeader, Request, HEADER_SIZE, PACKET_SIZE, PAYLOAD_SIZE, PEER_NAME_MAX,
};

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Incomplete packet: got {got} bytes, expected {expected}")]
    Incomplete { got: usize, expected: usize },

    #[error("Oversized datagram: got {got} bytes, expected {expected}")]
    Oversized { got: usize, expected: usize },

    #[error("Unknown request kind: {0:#04x}")]
    UnknownRequest(u8),

    #[error("Invalid peer name")]
    InvalidPeerName,

    #[error("Payload too large: {0} bytes (max: {1})")]
    PayloadTooLarge(usize, usize),

    #[error("Unsupported payload version: {0}")]
    UnsupportedPayloadVersion(u8),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Check that a header carries the protocol signature
pub fn validate(header: &PacketHeader) -> bool {
    header.is_valid()
}

/// Encode a header into exactly `HEADER_SIZE` bytes
pub fn encode_header(header: &PacketHeader, buf: &mut BytesMut) {
    let name = header.peer.as_bytes();

    buf.put_slice(&header.signature);
    buf.put_u8(header.version);
    buf.put_u8(header.request.type_id());
    buf.put_u8(name.len() as u8);
    buf.put_u8(0); // reserved
    buf.put_slice(name);
    buf.put_bytes(0, PEER_NAME_MAX - name.len());
    buf.put_u64(header.sequence);
}

/// Decode a header, consuming exactly `HEADER_SIZE` bytes
pub fn decode_header(buf: &mut &[u8]) -> CodecResult<PacketHeader> {
    if buf.remaining() < HEADER_SIZE {
        return Err(CodecError::Incomplete {
            got: buf.remaining(),
            expected: HEADER_SIZE,
        });
    }

    let mut signature = [0u8; 4];
    buf.copy_to_slice(&mut signature);
    let version = buf.get_u8();
    let request = buf.get_u8();
    let name_len = buf.get_u8() as usize;
    let _reserved = buf.get_u8();
    let mut name = [0u8; PEER_NAME_MAX];
    buf.copy_to_slice(&mut name);
    let sequence = buf.get_u64();

    let request = Request::try_from(request)?;

    if name_len == 0 || name_len > PEER_NAME_MAX {
        return Err(CodecError::InvalidPeerName);
    }
    let peer = std::str::from_utf8(&name[..name_len])
        .map_err(|_| CodecError::InvalidPeerName)?
        .to_string();

    Ok(PacketHeader {
        signature,
        version,
        peer,
        sequence,
        request,
    })
}

/// Encode a packet into exactly `PACKET_SIZE` bytes
pub fn encode_packet(packet: &Packet, buf: &mut BytesMut) {
    let payload = packet.payload();

    encode_header(packet.header(), buf);
    buf.put_u16(payload.len() as u16);
    buf.put_slice(payload);
    buf.put_bytes(0, PAYLOAD_SIZE - payload.len());
}

/// Decode a packet, consuming exactly `PACKET_SIZE` bytes
pub fn decode_packet(buf: &mut &[u8]) -> CodecResult<Packet> {
    if buf.remaining() < PACKET_SIZE {
        return Err(CodecError::Incomplete {
            got: buf.remaining(),
            expected: PACKET_SIZE,
        });
    }

    let header = decode_header(buf)?;
    let length = buf.get_u16() as usize;
    if length > PAYLOAD_SIZE {
        return Err(CodecError::PayloadTooLarge(length, PAYLOAD_SIZE));
    }

    let payload = Bytes::copy_from_slice(&buf[..length]);
    buf.advance(PAYLOAD_SIZE);

    Packet::new(header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{MAGIC_BYTES, PROTOCOL_VERSION};

    fn data_packet(peer: &str, sequence: u64, payload: &'static [u8]) -> Packet {
        let header = PacketHeader::new(peer, sequence, Request::Data).unwrap();
        Packet::new(header, Bytes::from_static(payload)).unwrap()
    }

    #[test]
    fn test_header_layout() {
        let header = PacketHeader::new("alice", 0x0102, Request::Join).unwrap();
        let mut buf = BytesMut::new();
        encode_header(&header, &mut buf);

        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[0..4], &MAGIC_BYTES);
        assert_eq!(buf[4], PROTOCOL_VERSION);
        assert_eq!(buf[5], Request::Join.type_id());
        assert_eq!(buf[6], 5);
        assert_eq!(&buf[8..13], b"alice");
        assert_eq!(&buf[HEADER_SIZE - 2..], &[0x01, 0x02]);
    }

    #[test]
    fn test_packet_fixed_size() {
        let mut buf = BytesMut::new();
        encode_packet(&data_packet("alice", 3, b"score"), &mut buf);
        assert_eq!(buf.len(), PACKET_SIZE);

        let mut slice = &buf[..];
        let decoded = decode_packet(&mut slice).unwrap();
        assert!(slice.is_empty());
        assert_eq!(decoded.header().sequence(), 3);
        assert_eq!(decoded.payload().as_ref(), b"score");
        assert!(validate(decoded.header()));
    }

    #[test]
    fn test_short_read_is_incomplete() {
        let mut buf = BytesMut::new();
        encode_packet(&data_packet("alice", 3, b""), &mut buf);

        let mut slice = &buf[..PACKET_SIZE - 1];
        assert!(matches!(
            decode_packet(&mut slice),
            Err(CodecError::Incomplete { expected: PACKET_SIZE, .. })
        ));
    }

    #[test]
    fn test_bad_signature_decodes_but_fails_validation() {
        let mut buf = BytesMut::new();
        encode_packet(&data_packet("mallory", 1, b""), &mut buf);
        buf[0..4].copy_from_slice(b"NOPE");

        let mut slice = &buf[..];
        let decoded = decode_packet(&mut slice).unwrap();
        assert!(!validate(decoded.header()));
    }

    #[test]
    fn test_zeroed_slot_is_rejected() {
        let zeros = [0u8; PACKET_SIZE];
        let mut slice = &zeros[..];
        assert!(matches!(
            decode_packet(&mut slice),
            Err(CodecError::UnknownRequest(0))
        ));
    }

    #[test]
    fn test_bad_peer_name() {
        let mut buf = BytesMut::new();
        encode_header(
            &PacketHeader::new("alice", 1, Request::Data).unwrap(),
            &mut buf,
        );
        buf[6] = (PEER_NAME_MAX + 1) as u8;

        let mut slice = &buf[..];
        assert!(matches!(
            decode_header(&mut slice),
            Err(CodecError::InvalidPeerName)
        ));

        buf[6] = 2;
        buf[8] = 0xFF;
        let mut slice = &buf[..];
        assert!(matches!(
            decode_header(&mut slice),
            Err(CodecError::InvalidPeerName)
        ));
    }

    #[test]
    fn test_oversized_payload_length() {
        let mut buf = BytesMut::new();
        encode_packet(&data_packet("alice", 1, b""), &mut buf);
        buf[HEADER_SIZE..HEADER_SIZE + 2].copy_from_slice(&((PAYLOAD_SIZE + 1) as u16).to_be_bytes());

        let mut slice = &buf[..];
        assert!(matches!(
            decode_packet(&mut slice),
            Err(CodecError::PayloadTooLarge(_, PAYLOAD_SIZE))
        ));
    }
}
