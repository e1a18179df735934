//! Frame types flowing through the pipeline
//!
//! Both frame types wrap `bytes::Bytes`, so cloning a frame only bumps a
//! reference count. Every subscriber in a fan-out pass shares one allocation.

use std::time::Instant;

use bytes::Bytes;

/// One captured image in the source encoding (JPEG for the bundled devices)
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Capture sequence number, starting at 1 for each run
    pub sequence: u64,
    /// When the capture thread received the frame
    pub captured_at: Instant,
    /// Encoded image bytes
    pub data: Bytes,
}

impl RawFrame {
    /// Create a raw frame stamped with the current time
    pub fn new(sequence: u64, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            captured_at: Instant::now(),
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// One annotated, re-encoded frame ready for transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFrame {
    /// Sequence number of the raw frame this was produced from
    pub sequence: u64,
    /// Encoded image bytes (zero-copy via reference counting)
    pub data: Bytes,
}

impl ProcessedFrame {
    pub fn new(sequence: u64, data: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            data: data.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processed_frame_clone_shares_data() {
        let frame = ProcessedFrame::new(7, vec![0xFF, 0xD8, 0xFF, 0xD9]);
        let copy = frame.clone();

        assert_eq!(copy, frame);
        assert_eq!(copy.data.as_ptr(), frame.data.as_ptr());
    }

    #[test]
    fn test_raw_frame_len() {
        let frame = RawFrame::new(1, Bytes::from_static(b"\xFF\xD8"));
        assert_eq!(frame.len(), 2);
        assert!(!frame.is_empty());
        assert!(RawFrame::new(2, Bytes::new()).is_empty());
    }
}
