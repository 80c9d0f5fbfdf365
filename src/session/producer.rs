//! Producer session
//!
//! Reads the capture stream, cuts it into payloads with a fresh
//! [`FrameDecoder`] and publishes each payload in arrival order. Nothing
//! survives the session: a reconnecting producer starts from an empty buffer.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::protocol::{ArFrame, FrameDecoder};
use crate::relay::BroadcastRelay;
use crate::server::ServerConfig;

use super::context::SessionContext;

/// Why a producer session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProducerExit {
    /// Peer closed the stream; `discarded` partial bytes were dropped
    Eof { discarded: usize },
    /// Shutdown or replacement by a newer producer
    Cancelled,
}

/// Read loop for one capture stream
pub struct ProducerSession<S> {
    ctx: SessionContext,
    stream: S,
    decoder: FrameDecoder,
    relay: Arc<BroadcastRelay>,
    idle_timeout: Duration,
    read_buffer_size: usize,
    inspect_frames: bool,
    last_timestamp: Option<i64>,
    frames: u64,
}

impl<S: AsyncRead + Unpin> ProducerSession<S> {
    /// Create a session over an accepted stream
    pub fn new(
        ctx: SessionContext,
        stream: S,
        relay: Arc<BroadcastRelay>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            ctx,
            stream,
            decoder: FrameDecoder::with_max_payload_size(config.max_payload_size),
            relay,
            idle_timeout: config.idle_timeout,
            read_buffer_size: config.read_buffer_size.max(1),
            inspect_frames: config.inspect_frames,
            last_timestamp: None,
            frames: 0,
        }
    }

    /// Session context
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Payloads published so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run until EOF, cancellation, or a fault
    ///
    /// Oversized length prefixes surface as [`Error::Protocol`]; read
    /// failures and idle timeouts as transient errors.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<ProducerExit> {
        loop {
            while let Some(payload) = self.decoder.decode()? {
                // A replaced producer stops at the next envelope boundary
                if cancel.is_cancelled() {
                    self.decoder.reset();
                    return Ok(ProducerExit::Cancelled);
                }
                self.handle_payload(payload).await;
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.decoder.reset();
                    return Ok(ProducerExit::Cancelled);
                }
                result = self.read_some() => result?,
            };

            if read == 0 {
                let discarded = self.decoder.buffered();
                if discarded > 0 {
                    tracing::debug!(
                        session_id = self.ctx.session_id,
                        discarded = discarded,
                        "Producer closed mid-envelope, discarding partial data"
                    );
                }
                self.decoder.reset();
                return Ok(ProducerExit::Eof { discarded });
            }
        }
    }

    async fn read_some(&mut self) -> Result<usize> {
        let buf = self.decoder.buffer_mut();
        buf.reserve(self.read_buffer_size);

        if self.idle_timeout.is_zero() {
            return Ok(self.stream.read_buf(buf).await?);
        }

        match tokio::time::timeout(self.idle_timeout, self.stream.read_buf(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(Error::Timeout(self.idle_timeout)),
        }
    }

    async fn handle_payload(&mut self, payload: Bytes) {
        self.frames += 1;
        self.relay.stats().frame_received(payload.len());

        if self.inspect_frames {
            self.inspect(&payload);
        }

        self.relay.publish(payload).await;
    }

    /// Log what the payload contains; never blocks relaying
    fn inspect(&mut self, payload: &[u8]) {
        let frame = match ArFrame::parse(payload) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(
                    session_id = self.ctx.session_id,
                    bytes = payload.len(),
                    error = %e,
                    "Payload is not a frame document, relaying as-is"
                );
                return;
            }
        };

        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                tracing::debug!(
                    session_id = self.ctx.session_id,
                    previous = last,
                    timestamp = frame.timestamp,
                    "Frame timestamp went backwards"
                );
            }
        }
        self.last_timestamp = Some(frame.timestamp);

        tracing::trace!(
            session_id = self.ctx.session_id,
            frame = %frame.summary(),
            "Inspected frame"
        );
    }
}
