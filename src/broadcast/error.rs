//! Delivery error types

use std::time::Duration;

use thiserror::Error;

/// Why a frame could not be delivered to one subscriber
///
/// Both variants mean the same thing to the stream: the subscriber is gone.
/// The distinction only shows up in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The subscriber's connection has closed
    #[error("subscriber disconnected")]
    Closed,

    /// The subscriber did not accept the frame in time
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
}
