use std::time::Instant;

use prometheus::proto::{self, MetricType};

pub(crate) mod counter;
pub(crate) mod gauge;
pub(crate) mod summary;

pub use counter::Counter;
pub use gauge::Gauge;
pub use summary::{Summary, SummaryConfig, OBJECTIVES};

/// The numeric state behind a registry entry. Every kind is a cheap handle
/// over shared, thread-safe storage, so cloning an entry to replace it in the
/// registry keeps feeding the same underlying value.
///
/// The differences between kinds (what a report does, what "stale" means)
/// live here so the registry can treat all of them the same way.
pub trait Aggregator: Clone + Send + Sync + 'static {
    /// Per-store settings used whenever a new aggregator is built.
    type Config: Clone + Send + Sync + 'static;

    fn new(config: &Self::Config) -> Self;

    fn metric_type() -> MetricType;

    /// Apply a reported value: set for gauges, add for counters, observe for
    /// summaries.
    fn record(&self, value: f64, now: Instant);

    /// Called by a sweep on a permanent entry nobody reported within the
    /// expiration window.
    fn mark_stale(&self);

    /// Write the current value into `metric`.
    fn fill(&self, metric: &mut proto::Metric, now: Instant);
}
