use std::{
    sync::{atomic, Arc},
    time::Instant,
};

use prometheus::proto::{self, MetricType};

/// The latest instantaneous value of something, stored as f64 bits.
#[derive(Clone, Default, Debug)]
pub struct Gauge {
    inner: Arc<atomic::AtomicU64>,
}

impl Gauge {
    pub fn set(&self, val: f64) {
        self.inner.store(val.to_bits(), atomic::Ordering::Relaxed)
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.inner.load(atomic::Ordering::Relaxed))
    }
}

impl super::Aggregator for Gauge {
    type Config = ();

    fn new(_config: &()) -> Self {
        Self::default()
    }

    fn metric_type() -> MetricType {
        MetricType::GAUGE
    }

    fn record(&self, value: f64, _now: Instant) {
        self.set(value);
    }

    /// We have not observed the gauge this interval so we don't know its value.
    fn mark_stale(&self) {
        self.set(f64::NAN);
    }

    fn fill(&self, metric: &mut proto::Metric, _now: Instant) {
        let mut gauge = proto::Gauge::default();
        gauge.set_value(self.get());
        metric.set_gauge(gauge);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Aggregator;

    #[test]
    fn clones_share_value() {
        let gauge = Gauge::default();
        let copy = gauge.clone();
        copy.set(7.5);
        assert_eq!(gauge.get(), 7.5);
    }

    #[test]
    fn stale_is_nan() {
        let gauge = Gauge::default();
        gauge.record(3.0, Instant::now());
        gauge.mark_stale();
        assert!(gauge.get().is_nan());
        gauge.record(4.0, Instant::now());
        assert_eq!(gauge.get(), 4.0);
    }
}
