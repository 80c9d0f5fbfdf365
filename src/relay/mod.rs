//! Fan-out of decoded payloads to every registered consumer

pub mod broadcast;

pub use broadcast::{BroadcastRelay, PublishReport};
