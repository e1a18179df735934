//! Error types
//!
//! Errors are split by how far they travel: a [`ProcessError`] costs one
//! frame, a [`CaptureError`] ends the current run, and send failures (see
//! [`crate::broadcast::SendError`]) only ever cost the subscriber involved.

use thiserror::Error;

/// Capture device failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    /// The device could not be opened
    #[error("capture device unavailable: {0}")]
    Unavailable(String),

    /// The device rejected the requested configuration
    #[error("capture configuration rejected: {0}")]
    Configure(String),

    /// No frame arrived within the device's own deadline
    #[error("no frame available within {0:?}")]
    Timeout(std::time::Duration),

    /// The device failed while producing frames
    #[error("capture failed: {0}")]
    Device(String),

    /// The source was used after it was closed
    #[error("capture source closed")]
    Closed,
}

impl CaptureError {
    /// Whether the capture loop may keep going after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CaptureError::Timeout(_))
    }
}

/// Error returned by an inference model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("inference failed: {0}")]
pub struct InferenceError(pub String);

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Per-frame processing failure. The frame is skipped, the stream continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    /// Input bytes could not be decoded
    #[error("undecodable frame: {0}")]
    Decode(String),

    /// The model rejected the image
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The annotated image could not be re-encoded
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Crate-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A background task panicked or was cancelled
    #[error("task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_only_timeouts_are_recoverable() {
        assert!(CaptureError::Timeout(Duration::from_millis(5)).is_recoverable());
        assert!(!CaptureError::Device("sensor unplugged".into()).is_recoverable());
        assert!(!CaptureError::Closed.is_recoverable());
    }

    #[test]
    fn test_inference_error_converts_to_process_error() {
        let err: ProcessError = InferenceError::new("model not loaded").into();
        assert_eq!(err.to_string(), "inference failed: model not loaded");
    }

    #[test]
    fn test_capture_error_is_transparent() {
        let err: Error = CaptureError::Unavailable("/dev/video0".into()).into();
        assert_eq!(err.to_string(), "capture device unavailable: /dev/video0");
    }
}
