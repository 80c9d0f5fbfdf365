//! Session context
//!
//! Identity of one connection, carried into its log events.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Which side of the relay a connection is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Capture device writing envelopes
    Producer,
    /// WebSocket viewer
    Consumer,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionRole::Producer => write!(f, "producer"),
            SessionRole::Consumer => write!(f, "consumer"),
        }
    }
}

/// Per-connection identity
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Unique session ID
    pub session_id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    /// Producer or consumer
    pub role: SessionRole,

    /// When the connection was accepted
    pub connected_at: Instant,
}

impl SessionContext {
    /// Create a new context
    pub fn new(session_id: u64, peer_addr: SocketAddr, role: SessionRole) -> Self {
        Self {
            session_id,
            peer_addr,
            role,
            connected_at: Instant::now(),
        }
    }

    /// Time since the connection was accepted
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
