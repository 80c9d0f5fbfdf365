//! Consumer registry implementation
//!
//! Owns the live set of viewers. Membership changes and broadcast snapshots
//! are serialized through one `RwLock`, so a snapshot is always a complete
//! view taken between two mutations.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::entry::{consumer_pair, ConsumerHandle, Subscription};

/// Live set of connected consumers
pub struct ConsumerRegistry {
    /// Map of consumer ID to handle
    consumers: RwLock<HashMap<u64, ConsumerHandle>>,

    /// Next consumer ID
    next_id: AtomicU64,

    /// Configuration
    config: RegistryConfig,
}

impl ConsumerRegistry {
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            consumers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Register a consumer
    ///
    /// Effective for every publish that takes its snapshot after this call
    /// returns. Nothing published earlier is replayed.
    pub async fn register(&self, peer_addr: SocketAddr) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (handle, subscription) =
            consumer_pair(id, peer_addr, self.config.send_queue_capacity);

        let mut consumers = self.consumers.write().await;
        consumers.insert(id, handle);

        tracing::info!(
            consumer_id = id,
            peer = %peer_addr,
            consumers = consumers.len(),
            "Consumer registered"
        );

        subscription
    }

    /// Remove a consumer
    ///
    /// Idempotent. Only the first caller gets the handle back, which makes
    /// that caller responsible for logging and counting the removal.
    pub async fn remove(&self, id: u64) -> Option<ConsumerHandle> {
        let mut consumers = self.consumers.write().await;
        let removed = consumers.remove(&id);

        if let Some(ref handle) = removed {
            tracing::debug!(
                consumer_id = id,
                peer = %handle.peer_addr,
                consumers = consumers.len(),
                "Consumer removed"
            );
        }

        removed
    }

    /// Point-in-time view of all consumers, ordered by ID
    pub async fn snapshot(&self) -> Vec<ConsumerHandle> {
        let consumers = self.consumers.read().await;
        let mut handles: Vec<ConsumerHandle> = consumers.values().cloned().collect();
        handles.sort_unstable_by_key(|h| h.id);
        handles
    }

    /// Check whether a consumer is registered
    pub async fn contains(&self, id: u64) -> bool {
        self.consumers.read().await.contains_key(&id)
    }

    /// Number of registered consumers
    pub async fn len(&self) -> usize {
        self.consumers.read().await.len()
    }

    /// Whether no consumers are registered
    pub async fn is_empty(&self) -> bool {
        self.consumers.read().await.is_empty()
    }

    /// Remove every consumer and tell each to shut down
    pub async fn close_all(&self) -> usize {
        let drained: Vec<ConsumerHandle> = {
            let mut consumers = self.consumers.write().await;
            consumers.drain().map(|(_, h)| h).collect()
        };

        for handle in &drained {
            handle.close();
        }

        if !drained.is_empty() {
            tracing::info!(consumers = drained.len(), "Closed all consumers");
        }

        drained.len()
    }
}

impl Default for ConsumerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
