//! Relay-wide counters
//!
//! Updated lock-free from every session; read through [`RelayStats::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Live counters shared by all sessions
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    producers_connected: AtomicU64,
    producers_rejected: AtomicU64,
    consumers_connected: AtomicU64,
    consumers_rejected: AtomicU64,
    frames_received: AtomicU64,
    bytes_received: AtomicU64,
    frames_delivered: AtomicU64,
    consumers_dropped_slow: AtomicU64,
    consumers_dropped_closed: AtomicU64,
    protocol_violations: AtomicU64,
}

impl RelayStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            producers_connected: AtomicU64::new(0),
            producers_rejected: AtomicU64::new(0),
            consumers_connected: AtomicU64::new(0),
            consumers_rejected: AtomicU64::new(0),
            frames_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            frames_delivered: AtomicU64::new(0),
            consumers_dropped_slow: AtomicU64::new(0),
            consumers_dropped_closed: AtomicU64::new(0),
            protocol_violations: AtomicU64::new(0),
        }
    }

    pub fn producer_connected(&self) {
        self.producers_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn producer_rejected(&self) {
        self.producers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consumer_connected(&self) {
        self.consumers_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consumer_rejected(&self) {
        self.consumers_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one decoded payload
    pub fn frame_received(&self, bytes: usize) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record deliveries of one published frame
    pub fn frames_delivered(&self, count: usize) {
        self.frames_delivered.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn consumer_dropped_slow(&self) {
        self.consumers_dropped_slow.fetch_add(1, Ordering::Relaxed);
    }

    pub fn consumer_dropped_closed(&self) {
        self.consumers_dropped_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn protocol_violation(&self) {
        self.protocol_violations.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current values
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            uptime: self.started_at.elapsed(),
            producers_connected: self.producers_connected.load(Ordering::Relaxed),
            producers_rejected: self.producers_rejected.load(Ordering::Relaxed),
            consumers_connected: self.consumers_connected.load(Ordering::Relaxed),
            consumers_rejected: self.consumers_rejected.load(Ordering::Relaxed),
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            frames_delivered: self.frames_delivered.load(Ordering::Relaxed),
            consumers_dropped_slow: self.consumers_dropped_slow.load(Ordering::Relaxed),
            consumers_dropped_closed: self.consumers_dropped_closed.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStatsSnapshot {
    pub uptime: Duration,
    /// Producer connections ever admitted
    pub producers_connected: u64,
    pub producers_rejected: u64,
    /// Consumer connections ever admitted
    pub consumers_connected: u64,
    pub consumers_rejected: u64,
    pub frames_received: u64,
    pub bytes_received: u64,
    /// Sum over frames of consumers that accepted the frame
    pub frames_delivered: u64,
    pub consumers_dropped_slow: u64,
    pub consumers_dropped_closed: u64,
    pub protocol_violations: u64,
}

impl RelayStatsSnapshot {
    /// Average inbound bitrate in bits per second
    pub fn inbound_bitrate(&self) -> u64 {
        let secs = self.uptime.as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}
