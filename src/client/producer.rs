//! Frame producer client
//!
//! High-level API for pushing capture frames into a relay.

use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::error::{Error, Result};
use crate::protocol::{encode_envelope, ArFrame};

use super::config::ClientConfig;

/// Events from the producer client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProducerEvent {
    /// Connected to the relay
    Connected,

    /// Connection lost or closed
    Disconnected,

    /// Error occurred
    Error(String),
}

/// Capture-side producer
///
/// # Example
/// ```no_run
/// use ar_relay::client::{ClientConfig, ProducerClient};
/// use ar_relay::protocol::{ArFrame, Quaternion, Vector3};
///
/// # async fn example() -> ar_relay::error::Result<()> {
/// let (mut client, _events) = ProducerClient::new(ClientConfig::new("127.0.0.1:11000"));
/// client.connect().await?;
///
/// let frame = ArFrame::new(Vector3::default(), Quaternion::IDENTITY, b"jpeg bytes", 0);
/// client.send_frame(&frame).await?;
/// # Ok(())
/// # }
/// ```
pub struct ProducerClient {
    config: ClientConfig,
    event_tx: mpsc::Sender<ProducerEvent>,
    stream: Option<TcpStream>,
    last_failure: Option<Instant>,
}

impl ProducerClient {
    /// Create a new client.
    ///
    /// Returns the client and a receiver for events.
    pub fn new(config: ClientConfig) -> (Self, mpsc::Receiver<ProducerEvent>) {
        let (tx, rx) = mpsc::channel(256);

        let client = Self {
            config,
            event_tx: tx,
            stream: None,
            last_failure: None,
        };

        (client, rx)
    }

    /// Connect to the relay
    pub async fn connect(&mut self) -> Result<()> {
        let connect = TcpStream::connect(self.config.addr.as_str());
        let stream = match tokio::time::timeout(self.config.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(self.fail(e.into())),
            Err(_) => return Err(self.fail(Error::Timeout(self.config.connect_timeout))),
        };

        if self.config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        tracing::debug!(addr = %self.config.addr, "Connected to relay");
        self.stream = Some(stream);
        self.last_failure = None;
        self.emit(ProducerEvent::Connected);
        Ok(())
    }

    /// Send one payload as an envelope
    ///
    /// Reconnects first if the previous connection failed and at least
    /// `reconnect_delay` has passed since; otherwise fails with
    /// `NotConnected` without touching the network.
    pub async fn send_payload(&mut self, payload: &[u8]) -> Result<()> {
        let envelope = encode_envelope(payload)?;

        if self.stream.is_none() {
            if let Some(at) = self.last_failure {
                if at.elapsed() < self.config.reconnect_delay {
                    return Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into());
                }
            }
            self.connect().await?;
        }

        let Some(stream) = self.stream.as_mut() else {
            return Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into());
        };

        let written = stream.write_all(&envelope).await;
        if let Err(e) = written {
            self.stream = None;
            self.emit(ProducerEvent::Disconnected);
            return Err(self.fail(e.into()));
        }

        Ok(())
    }

    /// Serialize and send a frame
    pub async fn send_frame(&mut self, frame: &ArFrame) -> Result<()> {
        let payload = frame.to_payload()?;
        self.send_payload(&payload).await
    }

    /// Disconnect from the relay
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
            self.emit(ProducerEvent::Disconnected);
        }
    }

    /// Check if currently connected
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn fail(&mut self, error: Error) -> Error {
        tracing::debug!(addr = %self.config.addr, error = %error, "Relay connection failed");
        self.last_failure = Some(Instant::now());
        self.emit(ProducerEvent::Error(error.to_string()));
        error
    }

    fn emit(&self, event: ProducerEvent) {
        // Never stall the capture loop on an unread event channel
        let _ = self.event_tx.try_send(event);
    }
}
