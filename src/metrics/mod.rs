//! Metrics for the battle engine
//!
//! Prometheus counters and histograms for pair selection, rating updates and
//! progress tracking.

pub mod collector;

pub use collector::{
    FallbackReason, MetricsCollector, MetricsTimer, ProgressMetrics, RatingMetrics,
    SelectionMetrics,
};
