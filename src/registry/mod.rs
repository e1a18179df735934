//! Subscriber registry
//!
//! The registry is the single owner of the subscriber set. The broadcaster
//! only ever sees a snapshot, and the stream controller only learns about
//! membership through the [`Transition`] each mutation returns.
//!
//! # Architecture
//!
//! ```text
//!        Arc<SubscriptionRegistry>
//!   ┌───────────────────────────────┐
//!   │ subscribers: HashMap<Id,      │
//!   │   Subscriber {                │
//!   │     tx: mpsc::Sender<Frame>,  │
//!   │   }                           │
//!   │ >                             │
//!   └──────────────┬────────────────┘
//!                  │ snapshot()
//!                  ▼
//!            [Broadcaster] ──► tx.send_timeout() ──► [WebSocket writer]
//! ```

pub mod config;
pub mod entry;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{Subscriber, SubscriberId};
pub use store::{SubscriptionRegistry, Transition};
