//! Protocol constants

/// Size of the little-endian length prefix in front of every payload
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default port the capture device connects to
pub const DEFAULT_PRODUCER_PORT: u16 = 11000;

/// Default port viewers open WebSocket connections on
pub const DEFAULT_CONSUMER_PORT: u16 = 8080;

/// Default upper bound for a single payload (16 MiB)
///
/// A compressed camera frame encoded as base64 JSON is a few hundred KiB;
/// anything near this bound indicates a corrupt or hostile length prefix.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

/// Default number of frames that may queue for one viewer before it is dropped
pub const DEFAULT_SEND_QUEUE_CAPACITY: usize = 64;

/// Default application-level read buffer for the capture stream
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;
