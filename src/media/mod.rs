//! Frame handling
//!
//! This module provides:
//! - Raw and processed frame types
//! - The overwrite-latest frame buffer between capture and processing

pub mod buffer;
pub mod frame;

pub use buffer::FrameBuffer;
pub use frame::{ProcessedFrame, RawFrame};
