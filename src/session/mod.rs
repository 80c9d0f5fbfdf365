//! Per-connection sessions
//!
//! A producer session owns the read loop of one capture stream. A consumer
//! session owns one WebSocket viewer: it drains the viewer's queue into the
//! socket and watches for the viewer going away.

pub mod consumer;
pub mod context;
pub mod producer;

pub use consumer::{ConsumerExit, ConsumerSession};
pub use context::{SessionContext, SessionRole};
pub use producer::{ProducerExit, ProducerSession};
