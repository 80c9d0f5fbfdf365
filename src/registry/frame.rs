//! Frames as they travel from the producer to the viewers

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// A decoded payload queued for delivery
///
/// Cheap to clone: the payload is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayFrame {
    /// Relay-wide publish order
    pub sequence: u64,
    /// Payload bytes exactly as received
    pub payload: Bytes,
}

impl RelayFrame {
    /// Create a new relay frame
    pub fn new(sequence: u64, payload: Bytes) -> Self {
        Self { sequence, payload }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Convert into one WebSocket message
    ///
    /// UTF-8 payloads (the JSON documents the capture device sends) go out as
    /// text; anything else as binary. The message owns its buffer, so this
    /// copies the payload once for the calling viewer.
    pub fn to_message(&self) -> Message {
        match std::str::from_utf8(&self.payload) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(self.payload.to_vec()),
        }
    }
}
