//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for pair selection, metadata
//! resolution, rating updates and progress tracking.

use crate::battle::strategy::SelectionStrategy;
use anyhow::Result;
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Why a special strategy degraded to a plain draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Timeout,
    EmptyTopList,
    Failed,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::Timeout => "timeout",
            FallbackReason::EmptyTopList => "empty_top_list",
            FallbackReason::Failed => "failed",
        }
    }
}

/// Main metrics collector for the battle engine
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Pair selection metrics
    selection_metrics: SelectionMetrics,

    /// Rating update metrics
    rating_metrics: RatingMetrics,

    /// Progress tracker metrics
    progress_metrics: ProgressMetrics,
}

/// Pair selection metrics
#[derive(Clone)]
pub struct SelectionMetrics {
    /// Pairs returned, by strategy
    pub pairs_selected_total: IntCounterVec,

    /// Special strategies that degraded to a plain draw
    pub fallbacks_total: IntCounterVec,

    /// Slot resolutions that failed and forced a redraw
    pub resolution_failures_total: IntCounterVec,

    /// Restarts caused by items missing from the rating store
    pub restarts_total: IntCounter,

    /// select_pair calls that returned an error
    pub selection_errors_total: IntCounterVec,

    /// End-to-end select_pair latency
    pub select_pair_duration: HistogramVec,
}

/// Rating update metrics
#[derive(Clone)]
pub struct RatingMetrics {
    /// Outcomes processed, by status
    pub outcomes_total: IntCounterVec,

    /// Rating calculation and persistence time
    pub apply_outcome_duration: Histogram,

    /// Points lost to integer truncation
    pub truncation_drift_total: IntCounter,
}

/// Progress tracker metrics
#[derive(Clone)]
pub struct ProgressMetrics {
    /// Users with a live progress record
    pub tracked_users: IntGauge,

    /// Records removed by idle pruning
    pub pruned_total: IntCounter,

    /// Counter resets triggered by selection restarts
    pub resets_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let selection_metrics = SelectionMetrics::new(&registry)?;
        let rating_metrics = RatingMetrics::new(&registry)?;
        let progress_metrics = ProgressMetrics::new(&registry)?;

        Ok(Self {
            registry,
            selection_metrics,
            rating_metrics,
            progress_metrics,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn selection(&self) -> &SelectionMetrics {
        &self.selection_metrics
    }

    pub fn rating(&self) -> &RatingMetrics {
        &self.rating_metrics
    }

    pub fn progress(&self) -> &ProgressMetrics {
        &self.progress_metrics
    }

    /// Record a pair returned by select_pair
    pub fn record_pair_selected(&self, strategy: SelectionStrategy, duration: Duration) {
        self.selection_metrics
            .pairs_selected_total
            .with_label_values(&[strategy.as_str()])
            .inc();

        self.selection_metrics
            .select_pair_duration
            .with_label_values(&["success"])
            .observe(duration.as_secs_f64());
    }

    /// Record a select_pair call that failed
    pub fn record_selection_error(&self, kind: &str, duration: Duration) {
        self.selection_metrics
            .selection_errors_total
            .with_label_values(&[kind])
            .inc();

        self.selection_metrics
            .select_pair_duration
            .with_label_values(&["error"])
            .observe(duration.as_secs_f64());
    }

    pub fn record_fallback(&self, strategy: SelectionStrategy, reason: FallbackReason) {
        self.selection_metrics
            .fallbacks_total
            .with_label_values(&[strategy.as_str(), reason.as_str()])
            .inc();
    }

    pub fn record_resolution_failure(&self, slot: char) {
        let slot = if slot == 'A' { "a" } else { "b" };
        self.selection_metrics
            .resolution_failures_total
            .with_label_values(&[slot])
            .inc();
    }

    pub fn record_restart(&self) {
        self.selection_metrics.restarts_total.inc();
        self.progress_metrics.resets_total.inc();
    }

    /// Record an outcome applied or rejected by the rating engine
    pub fn record_outcome(&self, success: bool, drift: i32, duration: Duration) {
        let status = if success { "applied" } else { "failed" };

        self.rating_metrics
            .outcomes_total
            .with_label_values(&[status])
            .inc();

        if drift < 0 {
            self.rating_metrics
                .truncation_drift_total
                .inc_by(drift.unsigned_abs() as u64);
        }

        self.rating_metrics
            .apply_outcome_duration
            .observe(duration.as_secs_f64());
    }

    pub fn update_tracked_users(&self, count: usize) {
        self.progress_metrics.tracked_users.set(count as i64);
    }

    pub fn record_pruned(&self, removed: usize) {
        self.progress_metrics.pruned_total.inc_by(removed as u64);
    }

    /// Render every registered metric in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl SelectionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let pairs_selected_total = IntCounterVec::new(
            Opts::new(
                "versus_engine_pairs_selected_total",
                "Battle pairs returned by strategy",
            ),
            &["strategy"],
        )?;
        registry.register(Box::new(pairs_selected_total.clone()))?;

        let fallbacks_total = IntCounterVec::new(
            Opts::new(
                "versus_engine_strategy_fallbacks_total",
                "Special strategies degraded to a plain draw",
            ),
            &["strategy", "reason"],
        )?;
        registry.register(Box::new(fallbacks_total.clone()))?;

        let resolution_failures_total = IntCounterVec::new(
            Opts::new(
                "versus_engine_resolution_failures_total",
                "Slot resolutions that forced a redraw",
            ),
            &["slot"],
        )?;
        registry.register(Box::new(resolution_failures_total.clone()))?;

        let restarts_total = IntCounter::new(
            "versus_engine_selection_restarts_total",
            "Selections restarted because an item was missing from the store",
        )?;
        registry.register(Box::new(restarts_total.clone()))?;

        let selection_errors_total = IntCounterVec::new(
            Opts::new(
                "versus_engine_selection_errors_total",
                "Failed select_pair calls",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(selection_errors_total.clone()))?;

        let select_pair_duration = HistogramVec::new(
            HistogramOpts::new(
                "versus_engine_select_pair_duration_seconds",
                "select_pair latency",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["status"],
        )?;
        registry.register(Box::new(select_pair_duration.clone()))?;

        Ok(Self {
            pairs_selected_total,
            fallbacks_total,
            resolution_failures_total,
            restarts_total,
            selection_errors_total,
            select_pair_duration,
        })
    }
}

impl RatingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let outcomes_total = IntCounterVec::new(
            Opts::new(
                "versus_engine_outcomes_total",
                "Battle outcomes processed by the rating engine",
            ),
            &["status"],
        )?;
        registry.register(Box::new(outcomes_total.clone()))?;

        let apply_outcome_duration = Histogram::with_opts(
            HistogramOpts::new(
                "versus_engine_apply_outcome_duration_seconds",
                "Rating calculation and persistence time",
            )
            .buckets(vec![0.0001, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        )?;
        registry.register(Box::new(apply_outcome_duration.clone()))?;

        let truncation_drift_total = IntCounter::new(
            "versus_engine_truncation_drift_total",
            "Rating points lost to integer truncation",
        )?;
        registry.register(Box::new(truncation_drift_total.clone()))?;

        Ok(Self {
            outcomes_total,
            apply_outcome_duration,
            truncation_drift_total,
        })
    }
}

impl ProgressMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tracked_users = IntGauge::new(
            "versus_engine_tracked_users",
            "Users with a live progress record",
        )?;
        registry.register(Box::new(tracked_users.clone()))?;

        let pruned_total = IntCounter::new(
            "versus_engine_progress_pruned_total",
            "Idle progress records removed",
        )?;
        registry.register(Box::new(pruned_total.clone()))?;

        let resets_total = IntCounter::new(
            "versus_engine_progress_resets_total",
            "Progress counters reset by selection restarts",
        )?;
        registry.register(Box::new(resets_total.clone()))?;

        Ok(Self {
            tracked_users,
            pruned_total,
            resets_total,
        })
    }
}
