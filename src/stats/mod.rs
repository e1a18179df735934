//! Pipeline statistics

pub mod metrics;

pub use metrics::{PipelineStats, StatsSnapshot};
