//! Relay server
//!
//! Two listeners share one registry: capture devices connect to the producer
//! port with raw TCP, viewers connect to the consumer port with WebSocket.

pub mod admission;
pub mod config;
pub mod listener;

pub use admission::{ProducerAdmission, ProducerLease, ProducerPolicy};
pub use config::ServerConfig;
pub use listener::RelayServer;
