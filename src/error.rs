//! Error types
//!
//! Every per-connection fault is expressed as an [`Error`]. Faults are
//! contained by the session that raised them; the classification helpers
//! decide how they are logged and counted.

use std::time::Duration;

use thiserror::Error;

use crate::registry::RegistryError;

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("frame codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Protocol violations close the connection and are never retried
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Transient faults (reset, broken pipe, timeout) end only the affected
    /// connection; the listener keeps accepting
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Io(_) | Error::Timeout(_) => true,
            Error::WebSocket(e) => matches!(
                e,
                tokio_tungstenite::tungstenite::Error::Io(_)
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::AlreadyClosed
            ),
            _ => false,
        }
    }
}

/// Violations of the envelope framing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("declared payload of {declared} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { declared: usize, max: usize },
}

/// Failures interpreting a payload as a structured frame
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("payload is not a valid frame document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image buffer is not valid base64: {0}")]
    Image(#[from] base64::DecodeError),
}
