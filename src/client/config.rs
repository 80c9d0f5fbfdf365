//! Client configuration

use std::time::Duration;

/// Settings for [`ProducerClient`](super::ProducerClient)
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay producer address (`host:port`)
    pub addr: String,

    /// Minimum wait after a failure before reconnecting
    pub reconnect_delay: Duration,

    /// Connection attempt timeout
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl ClientConfig {
    /// Create a config for the given relay address
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            reconnect_delay: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(5),
            tcp_nodelay: true,
        }
    }

    /// Set the reconnect delay
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
