//! Wire protocol for the capture stream
//!
//! The capture device writes a sequence of envelopes over a plain TCP stream:
//!
//! ```text
//! +----------------+---------------------------+
//! | Length (4, LE) | Payload (Length bytes)    |
//! +----------------+---------------------------+
//! ```
//!
//! The payload is a JSON frame document (see [`frame`]). The relay never needs
//! to look inside it to forward it.

pub mod constants;
pub mod envelope;
pub mod frame;

pub use envelope::{encode_envelope, FrameDecoder};
pub use frame::{ArFrame, FrameSummary, Quaternion, Vector3};
