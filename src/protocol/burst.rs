//! Burst framing
//!
//! A burst is the unit actually sent over the wire: the sender's
//! `WINDOW_SIZE` most recent packets, newest first, so a receiver that
//! missed up to `WINDOW_SIZE - 1` earlier datagrams can recover them from
//! the trailing slots of the next one.

use bytes::{BufMut, BytesMut};
use std::collections::VecDeque;

use super::{
    decode_header, decode_packet, encode_header, encode_packet, CodecError, CodecResult, Packet,
    PacketHeader, BURST_SIZE, PACKET_SIZE, WINDOW_SIZE,
};

/// A decoded burst datagram
#[derive(Debug, Clone)]
pub struct BurstFrame {
    /// Copy of slot 0's header
    header: PacketHeader,
    /// Packet slots, newest first. `None` marks an empty or undecodable slot.
    slots: [Option<Packet>; WINDOW_SIZE],
}

impl BurstFrame {
    /// Build a frame from packets ordered newest first.
    ///
    /// Packets beyond `WINDOW_SIZE` are dropped. Returns `None` when there is
    /// no packet to announce.
    pub fn from_newest_first<'a, I>(packets: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Packet>,
    {
        let mut packets = packets.into_iter().take(WINDOW_SIZE);
        let newest = packets.next()?.clone();
        let mut slots: [Option<Packet>; WINDOW_SIZE] = std::array::from_fn(|_| None);

        for (slot, packet) in slots.iter_mut().skip(1).zip(packets) {
            *slot = Some(packet.clone());
        }

        let header = newest.header().clone();
        slots[0] = Some(newest);
        Some(Self { header, slots })
    }

    /// The denormalized newest header
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    /// The most recently produced packet
    pub fn newest(&self) -> Option<&Packet> {
        self.slots[0].as_ref()
    }

    /// Slot `index`, counting back from the newest packet
    pub fn slot(&self, index: usize) -> Option<&Packet> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Number of leading occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().take_while(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `count` newest slots, oldest first.
    ///
    /// `count` is clamped to `WINDOW_SIZE`.
    pub fn recovered(&self, count: usize) -> impl Iterator<Item = Option<&Packet>> + '_ {
        let count = count.min(WINDOW_SIZE);
        self.slots[..count].iter().rev().map(Option::as_ref)
    }

    /// Encode into exactly `BURST_SIZE` bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(BURST_SIZE);
        encode_header(&self.header, buf);

        for slot in &self.slots {
            match slot {
                Some(packet) => encode_packet(packet, buf),
                None => buf.put_bytes(0, PACKET_SIZE),
            }
        }
    }

    /// Decode a burst datagram.
    ///
    /// A short datagram is `Incomplete` and a long one `Oversized`. The outer
    /// header must decode; an interior slot that does not decode becomes an
    /// empty slot.
    pub fn decode(datagram: &[u8]) -> CodecResult<Self> {
        if datagram.len() < BURST_SIZE {
            return Err(CodecError::Incomplete {
                got: datagram.len(),
                expected: BURST_SIZE,
            });
        }
        if datagram.len() > BURST_SIZE {
            return Err(CodecError::Oversized {
                got: datagram.len(),
                expected: BURST_SIZE,
            });
        }

        let mut buf = datagram;
        let header = decode_header(&mut buf)?;

        let slots = std::array::from_fn(|index| {
            let (raw, rest) = buf.split_at(PACKET_SIZE);
            buf = rest;

            if raw.iter().all(|b| *b == 0) {
                return None;
            }
            let mut raw = raw;
            match decode_packet(&mut raw) {
                Ok(packet) => Some(packet),
                Err(e) => {
                    tracing::debug!("Undecodable burst slot {} ignored: {}", index, e);
                    None
                }
            }
        });

        Ok(Self { header, slots })
    }
}

/// Sender-side history of the most recently produced packets
#[derive(Debug, Default)]
pub struct BurstWindow {
    packets: VecDeque<Packet>,
}

impl BurstWindow {
    pub fn new() -> Self {
        Self {
            packets: VecDeque::with_capacity(WINDOW_SIZE),
        }
    }

    /// Record a newly produced packet, evicting the oldest when full
    pub fn push(&mut self, packet: Packet) {
        self.packets.push_front(packet);
        self.packets.truncate(WINDOW_SIZE);
    }

    /// The current burst, or `None` before the first packet
    pub fn frame(&self) -> Option<BurstFrame> {
        BurstFrame::from_newest_first(self.packets.iter())
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Forget every packet, e.g. after leaving
    pub fn clear(&mut self) {
        self.packets.clear();
    }
}
