//! Relay server listener
//!
//! Binds the producer (raw TCP) and consumer (WebSocket) listeners, runs both
//! accept loops, and spawns one task per connection. Every task observes one
//! shared cancellation token and is tracked so shutdown can wait for all
//! sockets to be released.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::Result;
use crate::registry::{ConsumerRegistry, RegistryError};
use crate::relay::BroadcastRelay;
use crate::server::admission::ProducerAdmission;
use crate::server::config::ServerConfig;
use crate::session::{
    ConsumerSession, ProducerExit, ProducerSession, SessionContext, SessionRole,
};
use crate::stats::RelayStats;

/// State shared with every connection task
struct Shared {
    config: ServerConfig,
    relay: Arc<BroadcastRelay>,
    admission: Arc<ProducerAdmission>,
    next_session_id: AtomicU64,
    consumer_semaphore: Option<Arc<Semaphore>>,
}

/// Relay server with both listeners bound
pub struct RelayServer {
    producer_listener: TcpListener,
    consumer_listener: TcpListener,
    shared: Arc<Shared>,
}

impl RelayServer {
    /// Bind both listeners
    ///
    /// Failing to bind is the only fatal error the relay has.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        let producer_listener = TcpListener::bind(config.producer_addr()).await?;
        let consumer_listener = TcpListener::bind(config.consumer_addr()).await?;

        let registry = Arc::new(ConsumerRegistry::with_config(config.registry_config()));
        let relay = Arc::new(BroadcastRelay::new(registry, Arc::new(RelayStats::new())));

        let consumer_semaphore = if config.max_consumers > 0 {
            Some(Arc::new(Semaphore::new(config.max_consumers)))
        } else {
            None
        };

        let shared = Shared {
            admission: Arc::new(ProducerAdmission::new(config.producer_policy)),
            config,
            relay,
            next_session_id: AtomicU64::new(1),
            consumer_semaphore,
        };

        Ok(Self {
            producer_listener,
            consumer_listener,
            shared: Arc::new(shared),
        })
    }

    /// Address the capture stream listener is bound to
    pub fn producer_addr(&self) -> Result<SocketAddr> {
        Ok(self.producer_listener.local_addr()?)
    }

    /// Address the WebSocket listener is bound to
    pub fn consumer_addr(&self) -> Result<SocketAddr> {
        Ok(self.consumer_listener.local_addr()?)
    }

    /// Get a reference to the consumer registry
    pub fn registry(&self) -> &Arc<ConsumerRegistry> {
        self.shared.relay.registry()
    }

    /// Get a reference to the relay counters
    pub fn stats(&self) -> &Arc<RelayStats> {
        self.shared.relay.stats()
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` completes, every session is cancelled and awaited
    /// before this returns.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(
            producer_addr = %self.producer_addr()?,
            consumer_addr = %self.consumer_addr()?,
            policy = ?self.shared.admission.policy(),
            "Relay listening"
        );

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();

        if !self.shared.config.stats_interval.is_zero() {
            tracker.spawn(log_stats(Arc::clone(&self.shared), cancel.clone()));
        }

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&cancel, &tracker) => result,
        };

        cancel.cancel();
        self.registry().close_all().await;

        tracker.close();
        tracker.wait().await;
        tracing::info!("Relay stopped");

        result
    }

    async fn accept_loop(&self, cancel: &CancellationToken, tracker: &TaskTracker) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.producer_listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.handle_producer(socket, peer_addr, cancel, tracker),
                    Err(e) => tracing::error!(error = %e, "Failed to accept producer connection"),
                },
                accepted = self.consumer_listener.accept() => match accepted {
                    Ok((socket, peer_addr)) => self.handle_consumer(socket, peer_addr, cancel, tracker),
                    Err(e) => tracing::error!(error = %e, "Failed to accept consumer connection"),
                },
            }
        }
    }

    fn handle_producer(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        cancel: &CancellationToken,
        tracker: &TaskTracker,
    ) {
        let shared = &self.shared;
        let session_id = shared.next_session_id.fetch_add(1, Ordering::Relaxed);

        let lease = match shared.admission.admit(session_id, cancel) {
            Ok(lease) => lease,
            Err(e) => {
                tracing::warn!(
                    session_id = session_id,
                    peer = %peer_addr,
                    error = %e,
                    "Producer rejected"
                );
                shared.relay.stats().producer_rejected();
                return;
            }
        };

        if let Err(e) = configure_socket(&socket, &shared.config) {
            tracing::warn!(session_id = session_id, error = %e, "Failed to configure socket");
            return;
        }

        shared.relay.stats().producer_connected();
        tracing::info!(session_id = session_id, peer = %peer_addr, "Producer connected");

        let shared = Arc::clone(shared);
        tracker.spawn(async move {
            let ctx = SessionContext::new(session_id, peer_addr, SessionRole::Producer);
            let mut session =
                ProducerSession::new(ctx, socket, Arc::clone(&shared.relay), &shared.config);

            match session.run(lease.cancelled_token()).await {
                Ok(ProducerExit::Eof { discarded }) => {
                    tracing::info!(
                        session_id = session_id,
                        frames = session.frames(),
                        discarded = discarded,
                        duration_ms = session.context().duration().as_millis() as u64,
                        "Producer disconnected"
                    );
                }
                Ok(ProducerExit::Cancelled) => {
                    tracing::info!(
                        session_id = session_id,
                        frames = session.frames(),
                        "Producer session cancelled"
                    );
                }
                Err(e) if e.is_protocol_violation() => {
                    shared.relay.stats().protocol_violation();
                    tracing::warn!(
                        session_id = session_id,
                        peer = %peer_addr,
                        error = %e,
                        "Producer closed for protocol violation"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = session_id,
                        peer = %peer_addr,
                        error = %e,
                        "Producer connection error"
                    );
                }
            }

            drop(lease);
        });
    }

    fn handle_consumer(
        &self,
        socket: TcpStream,
        peer_addr: SocketAddr,
        cancel: &CancellationToken,
        tracker: &TaskTracker,
    ) {
        let shared = &self.shared;
        let session_id = shared.next_session_id.fetch_add(1, Ordering::Relaxed);

        // Check connection limit
        let permit = if let Some(ref sem) = shared.consumer_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    let e = RegistryError::ConsumerLimitReached {
                        max: shared.config.max_consumers,
                    };
                    tracing::warn!(peer = %peer_addr, error = %e, "Consumer rejected");
                    shared.relay.stats().consumer_rejected();
                    return;
                }
            }
        } else {
            None
        };

        if let Err(e) = configure_socket(&socket, &shared.config) {
            tracing::warn!(session_id = session_id, error = %e, "Failed to configure socket");
            return;
        }

        let shared = Arc::clone(shared);
        let cancel = cancel.clone();
        tracker.spawn(async move {
            let _permit = permit;

            let handshake = tokio::time::timeout(
                shared.config.handshake_timeout,
                tokio_tungstenite::accept_async(socket),
            );
            let ws = tokio::select! {
                _ = cancel.cancelled() => return,
                result = handshake => match result {
                    Ok(Ok(ws)) => ws,
                    Ok(Err(e)) => {
                        // Scanners and plain HTTP clients end up here
                        tracing::debug!(session_id = session_id, peer = %peer_addr, error = %e, "WebSocket handshake failed");
                        return;
                    }
                    Err(_) => {
                        tracing::debug!(session_id = session_id, peer = %peer_addr, "WebSocket handshake timed out");
                        return;
                    }
                },
            };

            shared.relay.stats().consumer_connected();
            let ctx = SessionContext::new(session_id, peer_addr, SessionRole::Consumer);
            let mut session = ConsumerSession::register(ctx, Arc::clone(shared.relay.registry())).await;
            let consumer_id = session.consumer_id();

            match session.run(ws, &cancel).await {
                Ok(exit) => {
                    tracing::info!(
                        session_id = session_id,
                        consumer_id = consumer_id,
                        reason = ?exit,
                        sent = session.sent(),
                        "Consumer disconnected"
                    );
                }
                Err(e) => {
                    tracing::debug!(
                        session_id = session_id,
                        consumer_id = consumer_id,
                        error = %e,
                        "Consumer connection error"
                    );
                }
            }
        });
    }
}

fn configure_socket(socket: &TcpStream, config: &ServerConfig) -> std::io::Result<()> {
    if config.tcp_nodelay {
        socket.set_nodelay(true)?;
    }
    Ok(())
}

async fn log_stats(shared: Arc<Shared>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(shared.config.stats_interval);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let stats = shared.relay.stats().snapshot();
        let consumers = shared.relay.registry().len().await;
        tracing::info!(
            producers = shared.admission.active_count(),
            consumers = consumers,
            frames_received = stats.frames_received,
            bytes_received = stats.bytes_received,
            frames_delivered = stats.frames_delivered,
            dropped_slow = stats.consumers_dropped_slow,
            dropped_closed = stats.consumers_dropped_closed,
            protocol_violations = stats.protocol_violations,
            inbound_bps = stats.inbound_bitrate(),
            "Relay stats"
        );
    }
}
