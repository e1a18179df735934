//! Stream pipeline configuration

use std::time::Duration;

use super::capture::Resolution;

/// Stream controller configuration options
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Resolution requested from the capture source
    pub resolution: Resolution,

    /// How long a single subscriber send may take before the subscriber is
    /// dropped
    pub send_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            resolution: Resolution::default(),
            send_timeout: Duration::from_secs(2),
        }
    }
}

impl StreamConfig {
    /// Set the capture resolution
    pub fn resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Resolution::new(width, height);
        self
    }

    /// Set the per-subscriber send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }
}
