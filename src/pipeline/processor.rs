//! Frame processing
//!
//! A [`FrameProcessor`] turns one raw frame into one processed frame. The
//! stock processor is [`JpegAnnotator`]: JPEG decode, model inference, JPEG
//! encode. Processors are called from the blocking pool and must not hold
//! mutable state of their own; anything loaded up front (model weights) is
//! read-only afterwards.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageError, ImageFormat, RgbImage};

use crate::error::{InferenceError, ProcessError};
use crate::media::{ProcessedFrame, RawFrame};

/// Default JPEG quality for re-encoded frames
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

/// Transformation applied to every captured frame
pub trait FrameProcessor: Send + Sync + 'static {
    fn process(&self, frame: &RawFrame) -> Result<ProcessedFrame, ProcessError>;
}

impl<F> FrameProcessor for F
where
    F: Fn(&RawFrame) -> Result<ProcessedFrame, ProcessError> + Send + Sync + 'static,
{
    fn process(&self, frame: &RawFrame) -> Result<ProcessedFrame, ProcessError> {
        self(frame)
    }
}

/// Image model run on every decoded frame
///
/// Implementations draw their results (boxes, labels) onto the image they
/// return.
pub trait InferenceModel: Send + Sync + 'static {
    fn infer(&self, image: RgbImage) -> Result<RgbImage, InferenceError>;
}

/// Model that returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl InferenceModel for Passthrough {
    fn infer(&self, image: RgbImage) -> Result<RgbImage, InferenceError> {
        Ok(image)
    }
}

/// Decode JPEG, run the model, re-encode JPEG
#[derive(Debug, Clone)]
pub struct JpegAnnotator<M> {
    model: M,
    quality: u8,
}

impl<M: InferenceModel> JpegAnnotator<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Set the output JPEG quality (1-100)
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }
}

impl<M: InferenceModel> FrameProcessor for JpegAnnotator<M> {
    fn process(&self, frame: &RawFrame) -> Result<ProcessedFrame, ProcessError> {
        let decoded = image::load_from_memory_with_format(&frame.data, ImageFormat::Jpeg)
            .map_err(|e| ProcessError::Decode(e.to_string()))?;

        let annotated = self.model.infer(decoded.to_rgb8())?;

        let jpeg =
            encode_jpeg(&annotated, self.quality).map_err(|e| ProcessError::Encode(e.to_string()))?;

        Ok(ProcessedFrame::new(frame.sequence, jpeg))
    }
}

/// Encode an RGB image as baseline JPEG
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let mut out = Vec::with_capacity(image.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(image)?;
    Ok(out)
}
