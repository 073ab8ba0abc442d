//! Per-peer connection state
//!
//! A connection is nothing more than a sequence cursor and an activity
//! timestamp. The table is owned by a single listener, so it needs no
//! locking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// State of one joined peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Peer identity
    peer: String,
    /// Sequence number of the last packet accepted from this peer
    sequence: u64,
    /// Last activity timestamp
    last_activity: Instant,
}

impl Connection {
    /// Create a connection from a Join
    pub fn new(peer: impl Into<String>, sequence: u64, now: Instant) -> Self {
        Self {
            peer: peer.into(),
            sequence,
            last_activity: now,
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// The cursor that incoming sequence numbers are compared to
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Record an accepted packet
    pub fn update(&mut self, sequence: u64, now: Instant) {
        self.sequence = sequence;
        self.last_activity = now;
    }

    /// Get time since last activity
    pub fn idle_time(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Checks if the peer has been silent for at least `timeout`
    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        self.idle_time(now) >= timeout
    }
}

/// All currently joined peers, keyed by identity
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: HashMap<String, Connection>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, peer: &str) -> Option<&Connection> {
        self.connections.get(peer)
    }

    pub fn get_mut(&mut self, peer: &str) -> Option<&mut Connection> {
        self.connections.get_mut(peer)
    }

    pub fn contains(&self, peer: &str) -> bool {
        self.connections.contains_key(peer)
    }

    /// Insert a fresh connection unless the peer is already joined.
    ///
    /// Returns `true` if the connection was created.
    pub fn join(&mut self, connection: Connection) -> bool {
        if self.connections.contains_key(connection.peer()) {
            return false;
        }
        self.connections
            .insert(connection.peer().to_string(), connection);
        true
    }

    pub fn remove(&mut self, peer: &str) -> Option<Connection> {
        self.connections.remove(peer)
    }

    /// Remove and return every connection silent for at least `timeout`
    pub fn evict_idle(&mut self, now: Instant, timeout: Duration) -> Vec<Connection> {
        let expired: Vec<String> = self
            .connections
            .values()
            .filter(|conn| conn.is_timed_out(now, timeout))
            .map(|conn| conn.peer().to_string())
            .collect();

        expired
            .iter()
            .filter_map(|peer| self.connections.remove(peer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }
}
