//! Capture, processing and the stream lifecycle
//!
//! - [`capture`]: capture device traits, the scoped [`CaptureGuard`] and the
//!   blocking capture loop
//! - [`processor`]: raw frame to annotated frame transformation
//! - [`controller`]: the [`StreamController`] state machine tying both to the
//!   subscriber registry

pub mod capture;
pub mod config;
pub mod controller;
pub mod processor;

pub use capture::{CaptureDevice, CaptureGuard, CaptureSource, Resolution, SyntheticCamera};
pub use config::StreamConfig;
pub use controller::{StreamController, StreamState, StreamStatus};
pub use processor::{
    encode_jpeg, FrameProcessor, InferenceModel, JpegAnnotator, Passthrough, DEFAULT_JPEG_QUALITY,
};
