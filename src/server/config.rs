//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::protocol::constants::*;
use crate::registry::RegistryConfig;
use crate::server::admission::ProducerPolicy;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address both listeners bind to
    pub bind_addr: IpAddr,

    /// Port for the capture stream
    pub producer_port: u16,

    /// Port for WebSocket viewers
    pub consumer_port: u16,

    /// Largest payload a producer may declare
    pub max_payload_size: usize,

    /// Frames queued per consumer before it is dropped
    pub send_queue_capacity: usize,

    /// Maximum concurrent consumers (0 = unlimited)
    pub max_consumers: usize,

    /// What to do when a second producer connects
    pub producer_policy: ProducerPolicy,

    /// WebSocket handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Disconnect a producer that sends nothing for this long (zero disables)
    pub idle_timeout: Duration,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Application-level read buffer size
    pub read_buffer_size: usize,

    /// Parse each payload as a frame document for logging
    pub inspect_frames: bool,

    /// Stats logging interval (zero disables)
    pub stats_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            producer_port: DEFAULT_PRODUCER_PORT,
            consumer_port: DEFAULT_CONSUMER_PORT,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            send_queue_capacity: DEFAULT_SEND_QUEUE_CAPACITY,
            max_consumers: 0, // Unlimited
            producer_policy: ProducerPolicy::Replace,
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: Duration::ZERO, // Capture devices may pause sharing indefinitely
            tcp_nodelay: true, // Important for low latency
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            inspect_frames: false,
            stats_interval: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Set the bind address
    pub fn bind(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the producer port (0 picks a free port)
    pub fn producer_port(mut self, port: u16) -> Self {
        self.producer_port = port;
        self
    }

    /// Set the consumer port (0 picks a free port)
    pub fn consumer_port(mut self, port: u16) -> Self {
        self.consumer_port = port;
        self
    }

    /// Set the payload size limit
    pub fn max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    /// Set the per-consumer queue bound (minimum 1)
    pub fn send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = capacity.max(1);
        self
    }

    /// Set maximum consumers
    pub fn max_consumers(mut self, max: usize) -> Self {
        self.max_consumers = max;
        self
    }

    /// Set the producer admission policy
    pub fn producer_policy(mut self, policy: ProducerPolicy) -> Self {
        self.producer_policy = policy;
        self
    }

    /// Set the WebSocket handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set the producer idle timeout
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Enable payload inspection
    pub fn inspect_frames(mut self, enabled: bool) -> Self {
        self.inspect_frames = enabled;
        self
    }

    /// Set the stats logging interval
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    /// Producer listener address
    pub fn producer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.producer_port)
    }

    /// Consumer listener address
    pub fn consumer_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.consumer_port)
    }

    /// Registry settings derived from this config
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig::default().send_queue_capacity(self.send_queue_capacity)
    }
}
