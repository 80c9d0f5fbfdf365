//! Broadcast relay
//!
//! [`BroadcastRelay::publish`] never waits on a consumer: each frame is
//! offered to every queue with `try_send`. A consumer whose queue is full, or
//! whose session is gone, is removed from the registry and told to close.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use crate::registry::{ConsumerRegistry, DeliveryFailure, RelayFrame};
use crate::stats::RelayStats;

/// Outcome of one publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Sequence number assigned to the frame
    pub sequence: u64,
    /// Consumers the frame was queued for
    pub delivered: usize,
    /// Consumers removed while publishing this frame
    pub dropped: usize,
}

/// Pushes every published frame to all current consumers
pub struct BroadcastRelay {
    registry: Arc<ConsumerRegistry>,
    stats: Arc<RelayStats>,
    next_sequence: AtomicU64,
}

impl BroadcastRelay {
    /// Create a relay over an existing registry
    pub fn new(registry: Arc<ConsumerRegistry>, stats: Arc<RelayStats>) -> Self {
        Self {
            registry,
            stats,
            next_sequence: AtomicU64::new(0),
        }
    }

    /// The registry this relay publishes to
    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        &self.registry
    }

    /// Shared counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Deliver one payload to every consumer in the current snapshot
    ///
    /// With no consumers registered the frame is silently discarded.
    pub async fn publish(&self, payload: Bytes) -> PublishReport {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let frame = RelayFrame::new(sequence, payload);
        let consumers = self.registry.snapshot().await;

        let mut delivered = 0;
        let mut failed = Vec::new();

        for handle in consumers {
            match handle.try_deliver(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(failure) => failed.push((handle.id, failure)),
            }
        }

        let mut dropped = 0;
        for (id, failure) in failed {
            // The consumer's own close path may have removed it already
            let Some(handle) = self.registry.remove(id).await else {
                continue;
            };
            dropped += 1;

            match failure {
                DeliveryFailure::QueueFull => {
                    tracing::warn!(
                        consumer_id = id,
                        peer = %handle.peer_addr,
                        queued = handle.queued(),
                        sequence = sequence,
                        "Dropping slow consumer"
                    );
                    self.stats.consumer_dropped_slow();
                    handle.evict_lagging();
                }
                DeliveryFailure::Closed => {
                    tracing::debug!(
                        consumer_id = id,
                        peer = %handle.peer_addr,
                        "Dropping closed consumer"
                    );
                    self.stats.consumer_dropped_closed();
                    handle.close();
                }
            }
        }

        self.stats.frames_delivered(delivered);

        tracing::trace!(
            sequence = sequence,
            bytes = frame.len(),
            delivered = delivered,
            dropped = dropped,
            "Published frame"
        );

        PublishReport {
            sequence,
            delivered,
            dropped,
        }
    }
}
