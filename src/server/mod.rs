//! HTTP and WebSocket transport
//!
//! Subscribers connect over `GET /ws` and receive every processed frame as a
//! binary message. The first subscriber starts the stream and the last one
//! to leave stops it; `POST /start` and `POST /stop` drive the stream
//! directly.

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::FramecastServer;
pub use routes::{build_router, AppState};
