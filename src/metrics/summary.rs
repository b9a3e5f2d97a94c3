use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use prometheus::proto::{self, MetricType};

/// The quantiles we report, paired with their allowed rank error.
pub const OBJECTIVES: [(f64, f64); 3] = [(0.5, 0.05), (0.9, 0.01), (0.99, 0.001)];

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(10);
const DEFAULT_AGE_BUCKETS: u32 = 5;
const DEFAULT_BUCKET_CAPACITY: usize = 512;

/// Shape of the sliding window a summary computes its quantiles over.
#[derive(Debug, Clone, Copy)]
pub struct SummaryConfig {
    /// Observations older than this no longer count toward quantiles.
    pub max_age: Duration,
    /// How many buckets `max_age` is split into. Samples age out one bucket
    /// at a time.
    pub age_buckets: u32,
    /// Upper bound on samples kept per bucket. Once full the oldest sample in
    /// the bucket is overwritten.
    pub bucket_capacity: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_AGE,
            age_buckets: DEFAULT_AGE_BUCKETS,
            bucket_capacity: DEFAULT_BUCKET_CAPACITY,
        }
    }
}

#[derive(Debug)]
struct AgeBucket {
    started: Instant,
    samples: Vec<f64>,
    /// Next slot to overwrite once `samples` reached capacity.
    next: usize,
}

impl AgeBucket {
    fn new(started: Instant) -> Self {
        Self {
            started,
            samples: Vec::new(),
            next: 0,
        }
    }

    fn push(&mut self, value: f64, capacity: usize) {
        if self.samples.len() < capacity {
            self.samples.push(value);
            return;
        }
        if capacity == 0 {
            return;
        }
        self.samples[self.next] = value;
        self.next = (self.next + 1) % capacity;
    }
}

#[derive(Debug)]
struct SummaryInner {
    config: SummaryConfig,
    /// Time span covered by a single age bucket.
    width: Duration,
    buckets: VecDeque<AgeBucket>,
    count: u64,
    sum: f64,
}

impl SummaryInner {
    fn new(config: SummaryConfig) -> Self {
        Self {
            config,
            width: config.max_age / config.age_buckets.max(1),
            buckets: VecDeque::with_capacity(config.age_buckets as usize + 1),
            count: 0,
            sum: 0f64,
        }
    }

    /// Drop every bucket that started more than `max_age` ago.
    fn rotate(&mut self, now: Instant) {
        while let Some(front) = self.buckets.front() {
            if now.saturating_duration_since(front.started) < self.config.max_age {
                break;
            }
            self.buckets.pop_front();
        }
    }

    fn observe(&mut self, value: f64, now: Instant) {
        self.count += 1;
        self.sum += value;
        self.rotate(now);
        let width = self.width;
        let capacity = self.config.bucket_capacity;
        match self.buckets.back_mut() {
            Some(bucket) if now.saturating_duration_since(bucket.started) < width => {
                bucket.push(value, capacity);
            }
            _ => {
                let mut bucket = AgeBucket::new(now);
                bucket.push(value, capacity);
                self.buckets.push_back(bucket);
            }
        }
    }

    fn quantiles(&mut self, now: Instant) -> Vec<(f64, f64)> {
        self.rotate(now);
        let mut samples: Vec<f64> = self
            .buckets
            .iter()
            .flat_map(|b| b.samples.iter().copied())
            .collect();
        samples.sort_unstable_by(f64::total_cmp);
        OBJECTIVES
            .iter()
            .map(|(q, _)| (*q, nearest_rank(&samples, *q)))
            .collect()
    }
}

/// Nearest-rank quantile of an already sorted slice, NaN if there is nothing
/// to rank.
fn nearest_rank(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

/// A threadsafe summary estimating [`OBJECTIVES`] over a sliding window of
/// recent observations. `count` and `sum` cover every observation ever made.
#[derive(Clone, Debug)]
pub struct Summary {
    inner: Arc<Mutex<SummaryInner>>,
}

impl Default for Summary {
    fn default() -> Self {
        Self::with_config(SummaryConfig::default())
    }
}

impl Summary {
    pub fn with_config(config: SummaryConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SummaryInner::new(config))),
        }
    }

    pub fn observe(&self, value: f64) {
        self.observe_at(value, Instant::now());
    }

    pub fn observe_at(&self, value: f64, now: Instant) {
        self.inner.lock().observe(value, now);
    }

    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    pub fn sum(&self) -> f64 {
        self.inner.lock().sum
    }

    /// `(quantile, value)` pairs for every objective as of `now`.
    pub fn quantiles_at(&self, now: Instant) -> Vec<(f64, f64)> {
        self.inner.lock().quantiles(now)
    }
}

impl super::Aggregator for Summary {
    type Config = SummaryConfig;

    fn new(config: &SummaryConfig) -> Self {
        Self::with_config(*config)
    }

    fn metric_type() -> MetricType {
        MetricType::SUMMARY
    }

    fn record(&self, value: f64, now: Instant) {
        self.observe_at(value, now);
    }

    /// We have observed nothing in this interval, empty the window so every
    /// quantile reports NaN until the next observation.
    fn mark_stale(&self) {
        self.inner.lock().buckets.clear();
    }

    fn fill(&self, metric: &mut proto::Metric, now: Instant) {
        let mut inner = self.inner.lock();
        let mut summary = proto::Summary::default();
        summary.set_sample_count(inner.count);
        summary.set_sample_sum(inner.sum);
        for (q, value) in inner.quantiles(now) {
            let mut quantile = proto::Quantile::default();
            quantile.set_quantile(q);
            quantile.set_value(value);
            summary.quantile.push(quantile);
        }
        metric.set_summary(summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Aggregator;

    #[test]
    fn exact_quantiles() {
        let summary = Summary::default();
        let now = Instant::now();
        for i in 1..=100 {
            summary.observe_at(i as f64, now);
        }
        assert_eq!(
            summary.quantiles_at(now),
            vec![(0.5, 50.0), (0.9, 90.0), (0.99, 99.0)]
        );
        assert_eq!(summary.count(), 100);
        assert_eq!(summary.sum(), 5050.0);
    }

    #[test]
    fn empty_is_nan() {
        let summary = Summary::default();
        assert!(summary
            .quantiles_at(Instant::now())
            .iter()
            .all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn samples_age_out() {
        let summary = Summary::default();
        let start = Instant::now();
        summary.observe_at(1000.0, start);
        let later = start + Duration::from_secs(6);
        summary.observe_at(1.0, later);

        let quantiles = summary.quantiles_at(later);
        assert_eq!(quantiles[2], (0.99, 1000.0));

        // The first sample is now older than max_age, the second is not.
        let quantiles = summary.quantiles_at(start + Duration::from_secs(11));
        assert!(quantiles.iter().all(|(_, v)| *v == 1.0));

        // Aging out never touches the lifetime totals.
        assert_eq!(summary.count(), 2);
        assert_eq!(summary.sum(), 1001.0);

        let quantiles = summary.quantiles_at(start + Duration::from_secs(17));
        assert!(quantiles.iter().all(|(_, v)| v.is_nan()));
    }

    #[test]
    fn bucket_capacity_bounds_memory() {
        let summary = Summary::with_config(SummaryConfig {
            bucket_capacity: 4,
            ..Default::default()
        });
        let now = Instant::now();
        for i in 0..100 {
            summary.observe_at(i as f64, now);
        }
        let inner = summary.inner.lock();
        assert_eq!(inner.buckets.len(), 1);
        assert_eq!(inner.buckets[0].samples.len(), 4);
        assert_eq!(inner.count, 100);
    }

    #[test]
    fn stale_clears_window() {
        let summary = Summary::default();
        let now = Instant::now();
        summary.record(5.0, now);
        summary.mark_stale();
        assert!(summary.quantiles_at(now).iter().all(|(_, v)| v.is_nan()));
        summary.record(6.0, now);
        assert_eq!(summary.quantiles_at(now)[0], (0.5, 6.0));
        assert_eq!(summary.count(), 2);
    }
}
