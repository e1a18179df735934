//! Capture devices
//!
//! A [`CaptureDevice`] opens a fresh [`CaptureSource`] for every run of the
//! stream. The source is wrapped in a [`CaptureGuard`] as soon as it is
//! opened, so it is stopped and closed exactly once on every exit path:
//! normal stop, capture failure, or a panic on the capture thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use image::{Rgb, RgbImage};

use crate::error::CaptureError;
use crate::media::{FrameBuffer, RawFrame};
use crate::stats::PipelineStats;

use super::processor::encode_jpeg;

/// Capture resolution in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self::new(640, 640)
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An open capture handle (camera, file, test pattern)
///
/// All methods may block; they are only ever called from the capture thread
/// or the blocking pool.
pub trait CaptureSource: Send {
    /// Apply the capture resolution before recording starts
    fn configure(&mut self, resolution: Resolution) -> Result<(), CaptureError>;

    /// Begin producing frames
    fn start(&mut self) -> Result<(), CaptureError>;

    /// Block until the next encoded frame is available
    ///
    /// [`CaptureError::Timeout`] means "no frame yet" and is retried; any
    /// other error ends the run.
    fn capture(&mut self) -> Result<Bytes, CaptureError>;

    /// Stop producing frames
    fn stop(&mut self);

    /// Release the underlying device
    fn close(&mut self);
}

/// Factory for capture sources, one per stream run
pub trait CaptureDevice: Send + Sync + 'static {
    fn open(&self) -> Result<Box<dyn CaptureSource>, CaptureError>;
}

/// Owns an open capture source and releases it exactly once
pub struct CaptureGuard {
    source: Option<Box<dyn CaptureSource>>,
    started: bool,
}

impl CaptureGuard {
    /// Open, configure and start a source from `device`
    ///
    /// If configuration or start fails the source is released before the
    /// error is returned.
    pub fn acquire(device: &dyn CaptureDevice, resolution: Resolution) -> Result<Self, CaptureError> {
        let mut guard = Self {
            source: Some(device.open()?),
            started: false,
        };

        let source = guard.source_mut()?;
        source.configure(resolution)?;
        source.start()?;
        guard.started = true;

        tracing::debug!(resolution = %resolution, "Capture resource acquired");
        Ok(guard)
    }

    /// Block until the source yields a frame
    pub fn capture(&mut self) -> Result<Bytes, CaptureError> {
        self.source_mut()?.capture()
    }

    /// Whether the source is still held
    pub fn is_held(&self) -> bool {
        self.source.is_some()
    }

    /// Stop and close the source. Later calls do nothing.
    pub fn release(&mut self) {
        if let Some(mut source) = self.source.take() {
            if self.started {
                source.stop();
            }
            source.close();
            tracing::debug!("Capture resource released");
        }
    }

    fn source_mut(&mut self) -> Result<&mut Box<dyn CaptureSource>, CaptureError> {
        self.source.as_mut().ok_or(CaptureError::Closed)
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Capture thread body: pull frames into `buffer` until `running` is cleared
///
/// The guard is consumed, so the source is released when this returns,
/// whichever way it returns.
pub(crate) fn capture_loop(
    mut guard: CaptureGuard,
    buffer: &FrameBuffer,
    running: &AtomicBool,
    stats: &PipelineStats,
) -> Result<(), CaptureError> {
    let mut sequence = 0;

    while running.load(Ordering::Acquire) {
        match guard.capture() {
            Ok(data) => {
                sequence += 1;
                stats.record_captured();
                buffer.write(RawFrame::new(sequence, data));
            }
            Err(e) if e.is_recoverable() => {
                tracing::trace!(error = %e, "No frame from capture source");
            }
            Err(e) => return Err(e),
        }
    }

    Ok(())
}

/// Test-pattern camera producing JPEG frames at a fixed rate
///
/// Stands in for real hardware in the demo server and tests. Each frame is a
/// colour gradient that scrolls by a few pixels per frame.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    frame_interval: Duration,
    quality: u8,
}

impl SyntheticCamera {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            quality: 80,
        }
    }

    /// Set the JPEG quality of generated frames (1-100)
    pub fn quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }
}

impl Default for SyntheticCamera {
    fn default() -> Self {
        // ~30 fps
        Self::new(Duration::from_millis(33))
    }
}

impl CaptureDevice for SyntheticCamera {
    fn open(&self) -> Result<Box<dyn CaptureSource>, CaptureError> {
        Ok(Box::new(SyntheticSource {
            resolution: Resolution::default(),
            frame_interval: self.frame_interval,
            quality: self.quality,
            next_due: None,
            frames: 0,
            closed: false,
        }))
    }
}

struct SyntheticSource {
    resolution: Resolution,
    frame_interval: Duration,
    quality: u8,
    /// Set while recording
    next_due: Option<Instant>,
    frames: u32,
    closed: bool,
}

impl SyntheticSource {
    fn render(&self) -> RgbImage {
        let shift = self.frames.wrapping_mul(4);
        RgbImage::from_fn(self.resolution.width, self.resolution.height, |x, y| {
            Rgb([
                (x.wrapping_add(shift) % 256) as u8,
                (y.wrapping_add(shift) % 256) as u8,
                128,
            ])
        })
    }
}

impl CaptureSource for SyntheticSource {
    fn configure(&mut self, resolution: Resolution) -> Result<(), CaptureError> {
        if resolution.width == 0 || resolution.height == 0 {
            return Err(CaptureError::Configure(format!(
                "unsupported resolution {}",
                resolution
            )));
        }
        self.resolution = resolution;
        Ok(())
    }

    fn start(&mut self) -> Result<(), CaptureError> {
        if self.closed {
            return Err(CaptureError::Closed);
        }
        self.next_due = Some(Instant::now());
        Ok(())
    }

    fn capture(&mut self) -> Result<Bytes, CaptureError> {
        let due = self
            .next_due
            .ok_or_else(|| CaptureError::Device("capture requested before start".into()))?;

        let now = Instant::now();
        if due > now {
            thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + self.frame_interval);

        let jpeg = encode_jpeg(&self.render(), self.quality)
            .map_err(|e| CaptureError::Device(e.to_string()))?;
        self.frames = self.frames.wrapping_add(1);

        Ok(Bytes::from(jpeg))
    }

    fn stop(&mut self) {
        self.next_due = None;
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
