//! Game-state payload schema
//!
//! The transport treats payloads as opaque bytes. Peers that speak the
//! game protocol put a version byte first, followed by a bincode encoded
//! [`GameUpdate`].

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use super::{CodecError, CodecResult, PAYLOAD_SIZE};

/// Version tag written as the first payload byte
pub const PAYLOAD_VERSION: u8 = 1;

/// Visible board rows plus the floor and ceiling border
pub const MATRIX_ROWS: usize = 22;

/// Visible board columns plus the left and right walls
pub const MATRIX_COLS: usize = 12;

/// Where a player is in the match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    Idle,
    Waiting,
    Ready,
    Playing,
    Paused,
    GameOver,
}

/// Snapshot of a player's board, one byte per cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixState {
    pub cells: [[u8; MATRIX_COLS]; MATRIX_ROWS],
}

impl Default for MatrixState {
    fn default() -> Self {
        Self {
            cells: [[0; MATRIX_COLS]; MATRIX_ROWS],
        }
    }
}

/// A domain update carried in a Data packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameUpdate {
    /// Player changed state
    State(GameState),

    /// Score board progress
    Progress { lines: u32, score: u32, level: u8 },

    /// Full board snapshot
    Matrix(MatrixState),

    /// Garbage lines sent to opponents
    LinesSent(u16),

    /// Opponents knocked out
    KnockOut(u16),
}

impl GameUpdate {
    /// Encode as a version-tagged payload
    pub fn to_payload(&self) -> CodecResult<Bytes> {
        let body = bincode::serialize(self)?;

        if body.len() + 1 > PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge(body.len() + 1, PAYLOAD_SIZE));
        }

        let mut buf = BytesMut::with_capacity(body.len() + 1);
        buf.put_u8(PAYLOAD_VERSION);
        buf.put_slice(&body);
        Ok(buf.freeze())
    }

    /// Decode a version-tagged payload
    pub fn from_payload(payload: &[u8]) -> CodecResult<Self> {
        let (version, body) = payload.split_first().ok_or(CodecError::Incomplete {
            got: 0,
            expected: 1,
        })?;

        if *version != PAYLOAD_VERSION {
            return Err(CodecError::UnsupportedPayloadVersion(*version));
        }

        Ok(bincode::deserialize(body)?)
    }
}
