//! Telemetry and logging infrastructure
//!
//! Structured logging with tracing plus the queue's drop/selection
//! counters.

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, init_logging_default, LogConfig};
pub use metrics::{MetricsSnapshot, SinkMetrics};
