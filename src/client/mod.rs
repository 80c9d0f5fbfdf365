//! Capture-side client
//!
//! Connects to the relay's producer port and writes frames as envelopes,
//! reconnecting after failures the way the capture device does.

pub mod config;
pub mod producer;

pub use config::ClientConfig;
pub use producer::{ProducerClient, ProducerEvent};
