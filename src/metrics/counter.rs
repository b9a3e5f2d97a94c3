use std::{
    sync::{atomic, Arc},
    time::Instant,
};

use prometheus::proto::{self, MetricType};

/// An accumulating total. Unlike a delta counter the value is never reset by
/// reading it, the scraper is the one computing rates.
#[derive(Clone, Default, Debug)]
pub struct Counter {
    inner: Arc<atomic::AtomicU64>,
}

impl Counter {
    pub fn add(&self, delta: f64) {
        // fetch_update only fails when the closure returns None
        let _ = self
            .inner
            .fetch_update(atomic::Ordering::Relaxed, atomic::Ordering::Relaxed, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }

    pub fn incr(&self) {
        self.add(1.0);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.inner.load(atomic::Ordering::Relaxed))
    }
}

impl super::Aggregator for Counter {
    type Config = ();

    fn new(_config: &()) -> Self {
        Self::default()
    }

    fn metric_type() -> MetricType {
        MetricType::COUNTER
    }

    fn record(&self, value: f64, _now: Instant) {
        self.add(value);
    }

    /// Counters remain at their previous value when not observed.
    fn mark_stale(&self) {}

    fn fill(&self, metric: &mut proto::Metric, _now: Instant) {
        let mut counter = proto::Counter::default();
        counter.set_value(self.get());
        metric.set_counter(counter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Aggregator;

    #[test]
    fn accumulates() {
        let counter = Counter::default();
        counter.incr();
        counter.add(2.5);
        counter.record(0.5, Instant::now());
        assert_eq!(counter.get(), 4.0);
    }

    #[test]
    fn stale_keeps_value() {
        let counter = Counter::default();
        counter.add(3.0);
        counter.mark_stale();
        assert_eq!(counter.get(), 3.0);
    }

    #[test]
    fn concurrent_adds() {
        let counter = Counter::default();
        std::thread::scope(|s| {
            for _ in 0..8 {
                let counter = counter.clone();
                s.spawn(move || {
                    for _ in 0..1000 {
                        counter.incr();
                    }
                });
            }
        });
        assert_eq!(counter.get(), 8000.0);
    }
}
