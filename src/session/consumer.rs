//! Consumer session
//!
//! Drains one viewer's queue into its WebSocket. Writes suspend only this
//! session; the relay keeps filling the queue without waiting, and evicts the
//! viewer if the queue overflows.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::registry::{ConsumerRegistry, Subscription};

use super::context::SessionContext;

/// Upper bound on sending the final close frame
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a consumer session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumerExit {
    /// Viewer closed the connection
    PeerClosed,
    /// Relay is shutting down
    Shutdown,
    /// Evicted for letting its queue overflow
    Lagging,
    /// Removed from the registry by someone else
    Evicted,
}

impl ConsumerExit {
    fn close_frame(&self) -> Option<CloseFrame<'static>> {
        match self {
            ConsumerExit::PeerClosed => None,
            ConsumerExit::Shutdown => Some(CloseFrame {
                code: CloseCode::Away,
                reason: "relay shutting down".into(),
            }),
            ConsumerExit::Lagging => Some(CloseFrame {
                code: CloseCode::Policy,
                reason: "consumer too slow".into(),
            }),
            ConsumerExit::Evicted => Some(CloseFrame {
                code: CloseCode::Normal,
                reason: "".into(),
            }),
        }
    }
}

/// One connected viewer
pub struct ConsumerSession {
    ctx: SessionContext,
    subscription: Subscription,
    registry: Arc<ConsumerRegistry>,
    sent: u64,
}

impl ConsumerSession {
    /// Register a new viewer and create its session
    pub async fn register(ctx: SessionContext, registry: Arc<ConsumerRegistry>) -> Self {
        let subscription = registry.register(ctx.peer_addr).await;
        Self {
            ctx,
            subscription,
            registry,
            sent: 0,
        }
    }

    /// Registry ID of this viewer
    pub fn consumer_id(&self) -> u64 {
        self.subscription.id
    }

    /// Session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Messages written so far
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Serve the viewer until it leaves, is evicted, or the relay shuts down
    ///
    /// The viewer is always removed from the registry before this returns.
    pub async fn run<S>(
        &mut self,
        ws: WebSocketStream<S>,
        shutdown: &CancellationToken,
    ) -> Result<ConsumerExit>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut sink, mut stream) = ws.split();

        let result = self.pump(&mut sink, &mut stream, shutdown).await;

        if let Ok(exit) = &result {
            if let Some(frame) = exit.close_frame() {
                let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.send(Message::Close(Some(frame))))
                    .await;
            }
        }

        self.registry.remove(self.subscription.id).await;

        result
    }

    async fn pump<S>(
        &mut self,
        sink: &mut futures_util::stream::SplitSink<WebSocketStream<S>, Message>,
        stream: &mut futures_util::stream::SplitStream<WebSocketStream<S>>,
        shutdown: &CancellationToken,
    ) -> Result<ConsumerExit>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let evicted = self.subscription.cancelled_token().clone();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(ConsumerExit::Shutdown),
                _ = evicted.cancelled() => {
                    return Ok(if self.subscription.was_lagging() {
                        ConsumerExit::Lagging
                    } else {
                        ConsumerExit::Evicted
                    });
                }
                frame = self.subscription.rx.recv() => {
                    let Some(frame) = frame else {
                        return Ok(ConsumerExit::Evicted);
                    };

                    // A stuck write must not outlive eviction or shutdown
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => {}
                        _ = evicted.cancelled() => {}
                        result = sink.send(frame.to_message()) => {
                            result?;
                            self.sent += 1;
                        }
                    }
                }
                message = stream.next() => match message {
                    Some(Ok(Message::Close(_))) | None => return Ok(ConsumerExit::PeerClosed),
                    // Viewers are receive-only; pings are answered by the transport
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                },
            }
        }
    }
}
