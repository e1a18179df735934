//! Frame fan-out
//!
//! Each processed frame is offered to every subscriber in a registry
//! snapshot at once. A pass finishes when every send has either landed or
//! timed out; the next frame is not touched until then, so no subscriber
//! ever builds up a backlog.

pub mod broadcaster;
pub mod error;

pub use broadcaster::{Broadcaster, PublishReport};
pub use error::SendError;
