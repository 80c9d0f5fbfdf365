//! Per-consumer registry entries
//!
//! A [`ConsumerHandle`] is the registry's side of one viewer: the sending half
//! of its queue plus a token to shut the viewer down. The viewer's own session
//! holds the matching [`Subscription`].

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use super::frame::RelayFrame;

/// Why a frame could not be queued for a consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The consumer's queue is at capacity
    QueueFull,
    /// The consumer's session has already gone away
    Closed,
}

/// Registry side of one connected consumer
#[derive(Debug, Clone)]
pub struct ConsumerHandle {
    /// Unique consumer ID
    pub id: u64,
    /// Remote peer address
    pub peer_addr: SocketAddr,
    /// When the consumer was registered
    pub joined_at: Instant,
    tx: mpsc::Sender<RelayFrame>,
    cancel: CancellationToken,
    lagged: Arc<AtomicBool>,
}

impl ConsumerHandle {
    /// Queue a frame without waiting
    pub fn try_deliver(&self, frame: RelayFrame) -> Result<(), DeliveryFailure> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryFailure::QueueFull,
            TrySendError::Closed(_) => DeliveryFailure::Closed,
        })
    }

    /// Frames currently waiting in this consumer's queue
    pub fn queued(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    /// Shut the consumer down because it could not keep up
    pub fn evict_lagging(&self) {
        self.lagged.store(true, Ordering::Release);
        self.cancel.cancel();
    }

    /// Shut the consumer down
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

/// Session side of one connected consumer
#[derive(Debug)]
pub struct Subscription {
    /// Unique consumer ID
    pub id: u64,
    /// Frames published after registration, in publish order
    pub rx: mpsc::Receiver<RelayFrame>,
    cancel: CancellationToken,
    lagged: Arc<AtomicBool>,
}

impl Subscription {
    /// Token fired when the registry wants this consumer gone
    pub fn cancelled_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the consumer was evicted for overflowing its queue
    pub fn was_lagging(&self) -> bool {
        self.lagged.load(Ordering::Acquire)
    }
}

/// Create both halves for a new consumer
pub(super) fn consumer_pair(
    id: u64,
    peer_addr: SocketAddr,
    capacity: usize,
) -> (ConsumerHandle, Subscription) {
    let (tx, rx) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();
    let lagged = Arc::new(AtomicBool::new(false));

    let handle = ConsumerHandle {
        id,
        peer_addr,
        joined_at: Instant::now(),
        tx,
        cancel: cancel.clone(),
        lagged: Arc::clone(&lagged),
    };
    let subscription = Subscription {
        id,
        rx,
        cancel,
        lagged,
    };

    (handle, subscription)
}
