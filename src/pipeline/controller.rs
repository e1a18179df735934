//! Stream lifecycle controller
//!
//! The controller owns the capture and processing loop and ties it to the
//! subscriber count:
//!
//! ```text
//!            start() / first subscriber
//!   ┌──────┐ ───────────────────────────► ┌─────────┐
//!   │ Idle │                               │ Running │
//!   └──────┘ ◄──────┐                      └────┬────┘
//!                   │ capture released          │ stop() / last subscriber
//!                   │                           │ / capture failure
//!               ┌───┴──────┐ ◄──────────────────┘
//!               │ Stopping │
//!               └──────────┘
//! ```
//!
//! While running, a blocking capture thread writes frames into a
//! [`FrameBuffer`] and the stream task reads the newest one, processes it on
//! the blocking pool, and publishes it to a registry snapshot. Every
//! lifecycle transition (start, stop, join, leave) is serialised behind one
//! async mutex, so at most one loop ever exists.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::{watch, Mutex, Notify};
use tokio::task::JoinHandle;

use super::capture::{capture_loop, CaptureDevice, CaptureGuard};
use super::config::StreamConfig;
use super::processor::FrameProcessor;
use crate::broadcast::Broadcaster;
use crate::error::{CaptureError, Result};
use crate::media::{FrameBuffer, RawFrame};
use crate::registry::{Subscriber, SubscriberId, SubscriptionRegistry, Transition};
use crate::stats::{PipelineStats, StatsSnapshot};

/// Lifecycle state of the capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamState {
    /// No capture resource held
    Idle,
    /// Capture resource held, frames flowing
    Running,
    /// Loop told to exit, capture resource being released
    Stopping,
}

/// Snapshot of the controller for status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct StreamStatus {
    pub state: StreamState,
    pub subscribers: usize,
    pub stats: StatsSnapshot,
}

/// Handle to the loop of one run
struct ActiveRun {
    /// Cleared to make the capture thread exit
    running: Arc<AtomicBool>,
    /// Wakes the stream task out of its frame wait
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl ActiveRun {
    fn is_live(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Wait for the stream task to exit
    ///
    /// Takes `&mut self` so the run stays in its slot until the task is gone,
    /// even if the waiting future is dropped.
    async fn finish(&mut self) {
        if let Err(e) = (&mut self.handle).await {
            tracing::error!(error = %e, "Stream task failed");
        }
    }
}

struct Shared {
    device: Arc<dyn CaptureDevice>,
    processor: Arc<dyn FrameProcessor>,
    registry: Arc<SubscriptionRegistry>,
    broadcaster: Broadcaster,
    stats: Arc<PipelineStats>,
    config: StreamConfig,
    state: watch::Sender<StreamState>,
    /// Capture error of the last run, handed to the next `start` unless the
    /// run is stopped first
    last_failure: StdMutex<Option<CaptureError>>,
    lifecycle: Mutex<Option<ActiveRun>>,
}

/// Starts and stops the capture pipeline
///
/// Cheap to clone; clones control the same pipeline.
#[derive(Clone)]
pub struct StreamController {
    shared: Arc<Shared>,
}

impl StreamController {
    /// Create an idle controller
    ///
    /// `registry` is the subscriber set frames are published to; it is shared
    /// with whatever accepts connections.
    pub fn new(
        device: impl CaptureDevice,
        processor: impl FrameProcessor,
        registry: Arc<SubscriptionRegistry>,
        config: StreamConfig,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);

        Self {
            shared: Arc::new(Shared {
                device: Arc::new(device),
                processor: Arc::new(processor),
                registry,
                broadcaster: Broadcaster::new(config.send_timeout),
                stats: Arc::new(PipelineStats::new()),
                config,
                state,
                last_failure: StdMutex::new(None),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.shared.registry
    }

    pub fn config(&self) -> &StreamConfig {
        &self.shared.config
    }

    /// Current lifecycle state
    pub fn state(&self) -> StreamState {
        *self.shared.state.borrow()
    }

    /// Wait until the controller reaches `target`
    pub async fn wait_for_state(&self, target: StreamState) {
        let mut rx = self.shared.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|state| *state == target).await;
    }

    /// Capture error from the last run that has not been reported yet
    pub fn pending_failure(&self) -> Option<CaptureError> {
        self.shared.failure().clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub async fn status(&self) -> StreamStatus {
        StreamStatus {
            state: self.state(),
            subscribers: self.shared.registry.len().await,
            stats: self.stats(),
        }
    }

    /// Start the pipeline if it is not running
    ///
    /// If the previous run ended in a capture failure and was not stopped
    /// since, that error is returned instead and the pipeline stays idle;
    /// call `start` again to retry.
    pub async fn start(&self) -> Result<()> {
        let mut run = self.shared.lifecycle.lock().await;
        self.shared.start_locked(&mut run).await
    }

    /// Stop the pipeline and wait until the capture resource is released
    ///
    /// Does nothing when already idle.
    pub async fn stop(&self) {
        let mut run = self.shared.lifecycle.lock().await;
        self.shared.stop_locked(&mut run).await;
    }

    /// Stop the pipeline for good as the process exits
    pub async fn shutdown(&self) {
        self.stop().await;

        let stats = self.stats();
        tracing::info!(
            runs = stats.runs_started,
            captured = stats.frames_captured,
            processed = stats.frames_processed,
            dropped = stats.frames_dropped,
            "Stream controller shut down"
        );
    }

    /// Register a subscriber, starting the pipeline if it is the first one
    ///
    /// If the pipeline cannot be started the subscriber is unregistered again
    /// and the error returned, so the next subscriber is the first one.
    pub async fn join(&self, subscriber: Subscriber) -> Result<()> {
        let mut run = self.shared.lifecycle.lock().await;
        let id = subscriber.id();

        if self.shared.registry.add(subscriber).await != Transition::Started {
            return Ok(());
        }

        let started = self.shared.start_locked(&mut run).await;
        if started.is_err() {
            self.shared.registry.remove(id).await;
        }
        started
    }

    /// Unregister a subscriber, stopping the pipeline if it was the last one
    pub async fn leave(&self, id: SubscriberId) {
        let mut run = self.shared.lifecycle.lock().await;

        if self.shared.registry.remove(id).await == Transition::Stopped {
            self.shared.stop_locked(&mut run).await;
        }
    }
}

impl Shared {
    async fn start_locked(self: &Arc<Self>, run: &mut Option<ActiveRun>) -> Result<()> {
        if let Some(active) = run.as_mut() {
            if active.is_live() {
                tracing::debug!("Stream already running");
                return Ok(());
            }
            // The previous run ended by itself or its stop was interrupted;
            // the capture resource is only free once the task is gone
            active.finish().await;
            *run = None;
        }

        let failure = self.failure().take();
        if let Some(failure) = failure {
            tracing::warn!(error = %failure, "Reporting capture failure of previous run");
            return Err(failure.into());
        }

        let device = Arc::clone(&self.device);
        let resolution = self.config.resolution;
        let acquired =
            tokio::task::spawn_blocking(move || CaptureGuard::acquire(device.as_ref(), resolution))
                .await?;

        let guard = match acquired {
            Ok(guard) => guard,
            Err(e) => {
                self.stats.record_capture_failure();
                tracing::error!(error = %e, "Failed to acquire capture device");
                return Err(e.into());
            }
        };

        let running = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(Notify::new());

        self.state.send_replace(StreamState::Running);
        self.stats.record_run_started();

        let handle = tokio::spawn(Arc::clone(self).run(
            guard,
            Arc::clone(&running),
            Arc::clone(&stop),
        ));
        *run = Some(ActiveRun {
            running,
            stop,
            handle,
        });

        tracing::info!(resolution = %resolution, "Stream started");
        Ok(())
    }

    async fn stop_locked(&self, run: &mut Option<ActiveRun>) {
        let Some(active) = run.as_mut() else {
            tracing::debug!("Stream already idle");
            return;
        };

        let was_live = active.is_live();
        active.running.store(false, Ordering::Release);
        self.enter_stopping();
        active.stop.notify_one();
        active.finish().await;
        *run = None;

        // Stopping acknowledges the run, including a failure it ended with
        let failure = self.failure().take();
        if let Some(e) = failure {
            tracing::debug!(error = %e, "Discarding capture failure of stopped run");
        }

        if was_live {
            tracing::info!("Stream stopped");
        }
    }

    /// Stop after the loop evicted the last subscriber, unless someone joined since
    async fn stop_if_unwatched(&self) {
        let mut run = self.lifecycle.lock().await;

        if self.registry.is_empty().await {
            tracing::info!("No subscribers left");
            self.stop_locked(&mut run).await;
        }
    }

    /// Body of the stream task for one run
    async fn run(self: Arc<Self>, guard: CaptureGuard, running: Arc<AtomicBool>, stop: Arc<Notify>) {
        let buffer = Arc::new(FrameBuffer::new());

        let mut capture = {
            let buffer = Arc::clone(&buffer);
            let running = Arc::clone(&running);
            let stats = Arc::clone(&self.stats);
            tokio::task::spawn_blocking(move || capture_loop(guard, &buffer, &running, &stats))
        };

        let mut version = 0;
        let mut capture_result = None;

        loop {
            tokio::select! {
                biased;
                _ = stop.notified() => break,
                joined = &mut capture => {
                    capture_result = Some(joined);
                    break;
                }
                frame = buffer.read_newer(&mut version) => self.process_frame(frame).await,
            }
        }

        running.store(false, Ordering::Release);
        self.enter_stopping();

        let capture_result = match capture_result {
            Some(joined) => joined,
            None => capture.await,
        };

        let failure = match capture_result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(e) => Some(CaptureError::Device(format!("capture thread failed: {}", e))),
        };

        if let Some(e) = failure {
            self.stats.record_capture_failure();
            tracing::error!(error = %e, "Capture failed, stream stopped");
            *self.failure() = Some(e);
        }

        self.state.send_replace(StreamState::Idle);
        tracing::debug!("Capture released");
    }

    async fn process_frame(self: &Arc<Self>, frame: RawFrame) {
        let sequence = frame.sequence;
        let processor = Arc::clone(&self.processor);

        let processed = match tokio::task::spawn_blocking(move || processor.process(&frame)).await {
            Ok(Ok(processed)) => processed,
            Ok(Err(e)) => {
                self.stats.record_dropped();
                tracing::warn!(sequence, error = %e, "Dropping frame");
                return;
            }
            Err(e) => {
                self.stats.record_dropped();
                tracing::error!(sequence, error = %e, "Frame processor failed");
                return;
            }
        };
        self.stats.record_processed();

        let subscribers = self.registry.snapshot().await;
        if subscribers.is_empty() {
            return;
        }

        let report = self.broadcaster.publish(&processed, subscribers).await;
        self.stats
            .record_publish(report.delivered.len(), report.disconnected.len());

        if report.disconnected.is_empty() {
            return;
        }

        if self.registry.evict(&report.disconnected_ids()).await == Transition::Stopped {
            // This task cannot wait for its own exit, so the stop runs separately
            let shared = Arc::clone(self);
            tokio::spawn(async move { shared.stop_if_unwatched().await });
        }
    }

    fn enter_stopping(&self) {
        self.state.send_if_modified(|state| {
            if *state == StreamState::Running {
                *state = StreamState::Stopping;
                true
            } else {
                false
            }
        });
    }

    fn failure(&self) -> MutexGuard<'_, Option<CaptureError>> {
        self.last_failure.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
