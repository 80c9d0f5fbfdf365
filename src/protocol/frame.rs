//! Capture frame documents
//!
//! The capture device serializes each camera pose and image as a JSON
//! document. The relay forwards payloads untouched; this module only exists
//! for inspection (logging, validation) and for the capture-side client.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// World-space position in metres
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Orientation as a unit quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One captured AR state update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArFrame {
    /// Camera position
    pub position: Vector3,
    /// Camera orientation
    pub rotation: Quaternion,
    /// Compressed camera image, base64 encoded
    pub image_buffer: String,
    /// Capture time in 100 ns ticks
    pub timestamp: i64,
}

impl ArFrame {
    /// Build a frame from raw (already compressed) image bytes
    pub fn new(position: Vector3, rotation: Quaternion, image: &[u8], timestamp: i64) -> Self {
        Self {
            position,
            rotation,
            image_buffer: BASE64.encode(image),
            timestamp,
        }
    }

    /// Parse a payload as a frame document
    pub fn parse(payload: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Serialize to the payload carried inside an envelope
    pub fn to_payload(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode the image buffer
    pub fn image_bytes(&self) -> Result<Vec<u8>, CodecError> {
        Ok(BASE64.decode(self.image_buffer.as_bytes())?)
    }

    /// Compact description for logging
    pub fn summary(&self) -> FrameSummary {
        FrameSummary {
            position: self.position,
            timestamp: self.timestamp,
            // base64 expands 3 bytes into 4 characters
            image_size: self.image_buffer.len() / 4 * 3,
        }
    }
}

/// What gets logged about an inspected frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSummary {
    pub position: Vector3,
    pub timestamp: i64,
    /// Approximate decoded image size in bytes
    pub image_size: usize,
}

impl std::fmt::Display for FrameSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ts={} pos=({:.2}, {:.2}, {:.2}) image~{}B",
            self.timestamp, self.position.x, self.position.y, self.position.z, self.image_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTURED: &str = r#"{"position":{"x":0.5,"y":1.25,"z":-2.0},"rotation":{"x":0.0,"y":0.7071,"z":0.0,"w":0.7071},"imageBuffer":"/9j/4AAQ","timestamp":638400000000000000}"#;

    #[test]
    fn test_parse_capture_document() {
        let frame = ArFrame::parse(CAPTURED.as_bytes()).unwrap();

        assert_eq!(frame.position, Vector3::new(0.5, 1.25, -2.0));
        assert_eq!(frame.rotation.w, 0.7071);
        assert_eq!(frame.timestamp, 638_400_000_000_000_000);
        assert_eq!(frame.image_bytes().unwrap(), vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
    }

    #[test]
    fn test_payload_uses_capture_field_names() {
        let frame = ArFrame::new(Vector3::default(), Quaternion::IDENTITY, b"jpg", 42);

        let json: serde_json::Value = serde_json::from_slice(&frame.to_payload().unwrap()).unwrap();

        assert_eq!(json["imageBuffer"], "anBn");
        assert_eq!(json["timestamp"], 42);
        assert_eq!(json["rotation"]["w"], 1.0);
    }

    #[test]
    fn test_parse_rejects_non_frame() {
        assert!(matches!(
            ArFrame::parse(b"not json"),
            Err(CodecError::Json(_))
        ));
        assert!(matches!(
            ArFrame::parse(br#"{"position":{"x":0,"y":0,"z":0}}"#),
            Err(CodecError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_image_buffer() {
        let mut frame = ArFrame::new(Vector3::default(), Quaternion::IDENTITY, b"", 0);
        frame.image_buffer = "***".into();

        assert!(matches!(frame.image_bytes(), Err(CodecError::Image(_))));
    }

    #[test]
    fn test_summary() {
        let frame = ArFrame::new(Vector3::new(1.0, 2.0, 3.0), Quaternion::IDENTITY, &[0u8; 300], 7);

        let summary = frame.summary();

        assert_eq!(summary.image_size, 300);
        assert_eq!(summary.to_string(), "ts=7 pos=(1.00, 2.00, 3.00) image~300B");
    }
}
