//! An immutable captured JPEG frame plus its capture timestamp.
//!
//! Decoding to pixel data is explicitly out of scope for this crate; the
//! width/height/stride accessors exist for API symmetry with the original
//! but are never populated since no decoder is wired in.

use std::time::SystemTime;

/// One JPEG frame as captured off the wire or out of a file, paired with
/// the wall-clock instant it was captured at.
#[derive(Debug, Clone)]
pub struct FrameRecord {
    timestamp: SystemTime,
    bytes: std::sync::Arc<[u8]>,
    width: Option<u32>,
    height: Option<u32>,
}

impl FrameRecord {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            bytes: std::sync::Arc::from(bytes.into_boxed_slice()),
            width: None,
            height: None,
        }
    }

    /// Construct with an explicit timestamp, for deterministic tests.
    pub fn with_timestamp(bytes: Vec<u8>, timestamp: SystemTime) -> Self {
        Self {
            timestamp,
            bytes: std::sync::Arc::from(bytes.into_boxed_slice()),
            width: None,
            height: None,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decoded width, if a decoder has populated it. Always `None` in this
    /// crate — no JPEG decode path is implemented.
    pub fn width(&self) -> Option<u32> {
        self.width
    }

    pub fn height(&self) -> Option<u32> {
        self.height
    }

    /// `true` when the payload starts with the JPEG SOI marker and ends
    /// with the EOI marker, as every emitted frame must.
    pub fn is_well_formed_jpeg(&self) -> bool {
        self.bytes.len() >= 4
            && self.bytes[0] == 0xFF
            && self.bytes[1] == 0xD8
            && self.bytes[self.bytes.len() - 2] == 0xFF
            && self.bytes[self.bytes.len() - 1] == 0xD9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_jpeg_detection() {
        let ok = FrameRecord::new(vec![0xFF, 0xD8, 0xAB, 0xFF, 0xD9]);
        assert!(ok.is_well_formed_jpeg());

        let bad = FrameRecord::new(vec![0x00, 0xD8, 0xAB, 0xFF, 0xD9]);
        assert!(!bad.is_well_formed_jpeg());
    }

    #[test]
    fn len_and_bytes_match_constructor_input() {
        let payload = vec![0xFF, 0xD8, 1, 2, 3, 0xFF, 0xD9];
        let frame = FrameRecord::new(payload.clone());
        assert_eq!(frame.len(), payload.len());
        assert_eq!(frame.bytes(), payload.as_slice());
    }

    #[test]
    fn decoded_dimensions_are_absent_by_default() {
        let frame = FrameRecord::new(vec![0xFF, 0xD8, 0xFF, 0xD9]);
        assert_eq!(frame.width(), None);
        assert_eq!(frame.height(), None);
    }
}
