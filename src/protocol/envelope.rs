//! Envelope framing
//!
//! [`FrameDecoder`] turns an arbitrarily fragmented byte stream back into the
//! payloads the capture device wrote. Fragments are appended to an internal
//! buffer; each call to [`FrameDecoder::decode`] yields at most one complete
//! payload and leaves any trailing partial envelope buffered.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::constants::{DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_READ_BUFFER_SIZE, LENGTH_PREFIX_SIZE};
use crate::error::ProtocolError;

/// Incremental decoder for length-prefixed envelopes
#[derive(Debug)]
pub struct FrameDecoder {
    /// Bytes received but not yet decoded
    buffer: BytesMut,
    /// Largest payload accepted before the stream is rejected
    max_payload_size: usize,
}

impl FrameDecoder {
    /// Create a decoder with the default payload limit
    pub fn new() -> Self {
        Self::with_max_payload_size(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a decoder rejecting payloads larger than `max_payload_size`
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(DEFAULT_READ_BUFFER_SIZE),
            max_payload_size,
        }
    }

    /// Payload limit in bytes
    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Append newly received bytes
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Direct access to the receive buffer, for `AsyncReadExt::read_buf`
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Number of bytes buffered that do not yet form a complete envelope
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Discard all buffered bytes
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Extract the next complete payload
    ///
    /// Returns `Ok(None)` when more bytes are needed. A prefix declaring more
    /// than the configured limit is rejected as soon as the prefix itself is
    /// complete, without waiting for the payload.
    pub fn decode(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
        let declared = u32::from_le_bytes(prefix) as usize;

        if declared > self.max_payload_size {
            return Err(ProtocolError::PayloadTooLarge {
                declared,
                max: self.max_payload_size,
            });
        }

        let total = LENGTH_PREFIX_SIZE + declared;
        if self.buffer.len() < total {
            self.buffer.reserve(total - self.buffer.len());
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX_SIZE);
        Ok(Some(self.buffer.split_to(declared).freeze()))
    }

    /// Append `data` and drain every payload that is now complete
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<Bytes>, ProtocolError> {
        self.extend(data);

        let mut payloads = Vec::new();
        while let Some(payload) = self.decode()? {
            payloads.push(payload);
        }
        Ok(payloads)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrap a payload in an envelope
pub fn encode_envelope(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::PayloadTooLarge {
        declared: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buf.put_u32_le(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}
