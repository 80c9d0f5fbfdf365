//! Registry configuration

use crate::protocol::constants::DEFAULT_SEND_QUEUE_CAPACITY;

/// Configuration for the consumer registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Frames that may wait in one consumer's queue before it counts as slow
    pub send_queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the per-consumer queue bound (minimum 1)
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity.max(1);
        self
    }
}
