//! Liveness sweeping
//!
//! Evicts peers that have gone silent. The sweep runs at most once per
//! interval no matter how fast the receive loop spins.

use std::time::{Duration, Instant};

use super::{Connection, ConnectionTable};

/// Periodic scan for timed out connections
#[derive(Debug)]
pub struct LivenessSweeper {
    interval: Duration,
    timeout: Duration,
    last_sweep: Instant,
}

impl LivenessSweeper {
    pub fn new(interval: Duration, timeout: Duration, now: Instant) -> Self {
        Self {
            interval,
            timeout,
            last_sweep: now,
        }
    }

    /// Whether a sweep is due at `now`
    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_sweep) >= self.interval
    }

    /// Time left until the next sweep is due, zero when already due
    pub fn next_due(&self, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(self.last_sweep))
    }

    /// Sweep the table if the interval has elapsed.
    ///
    /// Returns the evicted connections; the caller announces their departure.
    pub fn poll(&mut self, table: &mut ConnectionTable, now: Instant) -> Vec<Connection> {
        if !self.is_due(now) {
            return Vec::new();
        }
        self.last_sweep = now;
        table.evict_idle(now, self.timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
