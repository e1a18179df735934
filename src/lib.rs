//! # framecast
//!
//! Live frame streaming: capture frames from a camera, run each one through a
//! processing function and fan the result out to every connected viewer.
//!
//! ```text
//!  [capture thread] ──► FrameBuffer ──► FrameProcessor ──► Broadcaster ──► subscribers
//!                          (latest)      (blocking pool)    (per-sub timeout)
//!                                                                   ▲
//!              StreamController ◄── join / leave ── SubscriptionRegistry
//! ```
//!
//! The pipeline runs only while someone is watching: the first subscriber
//! starts it and the last one to leave stops it, releasing the camera.
//! Slow consumers never slow down capture. The buffer only keeps the newest
//! frame and every send is bounded by a timeout, after which the subscriber
//! is dropped.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framecast::pipeline::{JpegAnnotator, Passthrough, StreamConfig, StreamController, SyntheticCamera};
//! use framecast::registry::SubscriptionRegistry;
//! use framecast::server::{FramecastServer, ServerConfig};
//!
//! # async fn run() -> framecast::Result<()> {
//! let controller = StreamController::new(
//!     SyntheticCamera::default(),
//!     JpegAnnotator::new(Passthrough),
//!     Arc::new(SubscriptionRegistry::new()),
//!     StreamConfig::default(),
//! );
//!
//! let server = FramecastServer::new(ServerConfig::default(), controller);
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

pub mod broadcast;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod registry;
pub mod server;
pub mod stats;

pub use error::{CaptureError, Error, InferenceError, ProcessError, Result};
pub use media::{FrameBuffer, ProcessedFrame, RawFrame};
pub use pipeline::{StreamConfig, StreamController, StreamState};
pub use registry::{SubscriberId, SubscriptionRegistry};
pub use server::{FramecastServer, ServerConfig};
