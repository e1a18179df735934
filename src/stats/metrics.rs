//! Statistics and metrics for the frame pipeline

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Pipeline-wide counters
///
/// Updated lock-free from the capture thread, the processing loop and the
/// controller. Counters accumulate across runs.
#[derive(Debug)]
pub struct PipelineStats {
    created_at: Instant,
    runs_started: AtomicU64,
    frames_captured: AtomicU64,
    frames_processed: AtomicU64,
    frames_dropped: AtomicU64,
    deliveries: AtomicU64,
    send_failures: AtomicU64,
    capture_failures: AtomicU64,
}

impl PipelineStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
            runs_started: AtomicU64::new(0),
            frames_captured: AtomicU64::new(0),
            frames_processed: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            capture_failures: AtomicU64::new(0),
        }
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_captured(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A frame was skipped because it could not be processed
    pub fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Result of one fan-out pass
    pub fn record_publish(&self, delivered: usize, failed: usize) {
        self.deliveries.fetch_add(delivered as u64, Ordering::Relaxed);
        self.send_failures.fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub fn record_capture_failure(&self) {
        self.capture_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a consistent-enough copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.created_at.elapsed(),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            capture_failures: self.capture_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for PipelineStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Time since the stats tracker was created
    #[serde(rename = "uptime_secs", serialize_with = "as_secs")]
    pub uptime: Duration,
    /// Number of times the capture pipeline was started
    pub runs_started: u64,
    /// Frames received from capture sources
    pub frames_captured: u64,
    /// Frames successfully processed
    pub frames_processed: u64,
    /// Frames skipped after a processing error
    pub frames_dropped: u64,
    /// Successful per-subscriber sends
    pub deliveries: u64,
    /// Failed or timed-out per-subscriber sends
    pub send_failures: u64,
    /// Runs that ended in a capture error
    pub capture_failures: u64,
}

impl StatsSnapshot {
    /// Fraction of processing attempts that were dropped
    pub fn drop_rate(&self) -> f64 {
        let attempts = self.frames_processed + self.frames_dropped;
        if attempts > 0 {
            self.frames_dropped as f64 / attempts as f64
        } else {
            0.0
        }
    }

    /// Average processed frames per second since creation
    pub fn processed_fps(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_processed as f64 / secs
        } else {
            0.0
        }
    }
}

fn as_secs<S: serde::Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}
