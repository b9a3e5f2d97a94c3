use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use prometheus::{
    core::{Collector, Desc},
    proto::{self, MetricFamily},
};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::{
    error::{Error, Result},
    key::flatten_key,
    metrics::{Aggregator, Counter, Gauge, Summary, SummaryConfig},
    options::{MetricDef, Options, Registerer},
    utils::BuildKeyHasher,
};

/// A single metric tracked by the registry. Entries are never mutated while
/// stored, a report clones the entry, updates the copy and publishes it in
/// place of the old one.
#[derive(Clone, Debug)]
struct Entry<M> {
    name: Arc<str>,
    labels: Arc<[(String, String)]>,
    metric: M,
    updated_at: Instant,
    /// Set if the metric was created by a report, so we know it's ephemeral
    /// and can delete it on expiry.
    deletable: bool,
}

impl<M: Aggregator> Entry<M> {
    fn is_stale(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.updated_at) > window
    }

    /// Apply our expiry policy to a stale entry. Returns true if the entry
    /// must be removed from the registry.
    fn expire(&self) -> bool {
        if self.deletable {
            return true;
        }
        self.metric.mark_stale();
        false
    }

    #[allow(deprecated)]
    fn snapshot(&self, now: Instant) -> MetricFamily {
        let mut sorted: SmallVec<[&(String, String); 8]> = self.labels.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut metric = proto::Metric::default();
        metric.label = sorted
            .into_iter()
            .map(|(name, value)| {
                let mut pair = proto::LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.clone());
                pair
            })
            .collect();
        self.metric.fill(&mut metric, now);

        let mut family = MetricFamily::default();
        family.set_name(self.name.to_string());
        family.set_help(self.name.to_string());
        family.set_field_type(M::metric_type());
        family.metric.push(metric);
        family
    }
}

/// What a single sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub emitted: usize,
    /// Ephemeral entries removed for being stale.
    pub evicted: usize,
    /// Declared entries that were stale but kept.
    pub stale: usize,
}

/// All entries of a single metric kind.
struct Store<M: Aggregator> {
    entries: DashMap<String, Entry<M>, BuildKeyHasher>,
    config: M::Config,
}

impl<M: Aggregator> Store<M> {
    fn new(config: M::Config) -> Self {
        Self {
            entries: DashMap::with_hasher(BuildKeyHasher),
            config,
        }
    }

    fn declare(&self, def: &MetricDef, now: Instant) {
        let flat = flatten_key(def.name.as_slice(), def.const_labels.as_slice());
        let metric = M::new(&self.config);
        // Initialize at zero
        metric.record(0f64, now);
        self.entries.insert(
            flat.key,
            Entry {
                name: flat.name.into(),
                labels: def.const_labels.clone().into(),
                metric,
                updated_at: now,
                deletable: false,
            },
        );
    }

    fn report(&self, parts: &[&str], value: f64, labels: &[(&str, &str)], now: Instant) {
        let flat = flatten_key(parts, labels);
        // The entry holds the shard lock from lookup to publish, so two
        // reporters creating the same key can't lose each other's values.
        self.entries
            .entry(flat.key)
            .and_modify(|entry| {
                let mut local = entry.clone();
                local.metric.record(value, now);
                local.updated_at = now;
                *entry = local;
            })
            .or_insert_with(|| {
                tracing::trace!(message = "creating ephemeral metric", name = %flat.name);
                let metric = M::new(&self.config);
                metric.record(value, now);
                Entry {
                    name: flat.name.as_str().into(),
                    labels: labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    metric,
                    updated_at: now,
                    deletable: true,
                }
            });
    }

    /// Apply expiry under the shard locks, then snapshot and emit the
    /// survivors once the locks are released. `emit` may report into the
    /// registry.
    fn sweep<F>(
        &self,
        now: Instant,
        window: Option<Duration>,
        emit: &mut F,
        stats: &mut SweepStats,
    ) where
        F: FnMut(MetricFamily),
    {
        let mut live = Vec::with_capacity(self.entries.len());
        self.entries.retain(|_, entry| {
            if let Some(window) = window {
                if entry.is_stale(now, window) {
                    if entry.expire() {
                        stats.evicted += 1;
                        return false;
                    }
                    stats.stale += 1;
                }
            }
            live.push(entry.clone());
            true
        });
        for entry in live {
            emit(entry.snapshot(now));
            stats.emitted += 1;
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

struct Inner {
    gauges: Store<Gauge>,
    summaries: Store<Summary>,
    counters: Store<Counter>,
    expiration: Duration,
    placeholder: Desc,
}

/// A concurrent store of gauges, counters and summaries keyed by their
/// flattened name and labels. Reports lazily create whatever they touch and
/// every collection expires metrics nobody reported recently.
///
/// Cloning a registry is cheap, all clones share the same metrics.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<Inner>,
}

impl Registry {
    /// Create a registry with the default [`Options`], registered with the
    /// process wide prometheus registry.
    pub fn new() -> Result<Self> {
        Self::with_options(Options::default())
    }

    pub fn with_options(opts: Options) -> Result<Self> {
        // Prometheus refuses collectors with identical descriptors, so every
        // registry gets its own.
        let placeholder = Desc::new(
            format!("promsink_placeholder_{}", Uuid::new_v4().simple()),
            "placeholder descriptor, never exported".to_string(),
            Vec::new(),
            HashMap::new(),
        )
        .map_err(Error::Describe)?;

        let summary_config = SummaryConfig {
            max_age: opts.summary_max_age,
            ..Default::default()
        };
        let inner = Inner {
            gauges: Store::new(()),
            summaries: Store::new(summary_config),
            counters: Store::new(()),
            expiration: opts.expiration,
            placeholder,
        };
        let now = Instant::now();
        for def in &opts.gauges {
            inner.gauges.declare(def, now);
        }
        for def in &opts.summaries {
            inner.summaries.declare(def, now);
        }
        for def in &opts.counters {
            inner.counters.declare(def, now);
        }

        let registry = Self {
            inner: Arc::new(inner),
        };
        let registered = match &opts.registerer {
            Registerer::Default => {
                prometheus::default_registry().register(Box::new(registry.clone()))
            }
            Registerer::Custom(target) => target.register(Box::new(registry.clone())),
            Registerer::Unregistered => Ok(()),
        };
        registered.map_err(Error::Register)?;
        tracing::debug!(
            message = "created metrics registry",
            expiration = ?opts.expiration,
            declared = registry.len(),
        );
        Ok(registry)
    }

    pub fn set_gauge(&self, parts: &[&str], val: f32) {
        self.set_gauge_with_labels(parts, val, &[]);
    }

    pub fn set_gauge_with_labels(&self, parts: &[&str], val: f32, labels: &[(&str, &str)]) {
        self.inner
            .gauges
            .report(parts, f64::from(val), labels, Instant::now());
    }

    pub fn incr_counter(&self, parts: &[&str], val: f32) {
        self.incr_counter_with_labels(parts, val, &[]);
    }

    pub fn incr_counter_with_labels(&self, parts: &[&str], val: f32, labels: &[(&str, &str)]) {
        self.inner
            .counters
            .report(parts, f64::from(val), labels, Instant::now());
    }

    pub fn add_sample(&self, parts: &[&str], val: f32) {
        self.add_sample_with_labels(parts, val, &[]);
    }

    pub fn add_sample_with_labels(&self, parts: &[&str], val: f32, labels: &[(&str, &str)]) {
        self.inner
            .summaries
            .report(parts, f64::from(val), labels, Instant::now());
    }

    /// Walk every metric as of `now`, handing the live ones to `emit`.
    ///
    /// Metrics not reported within the expiration window are handled based on
    /// how they were created. Ephemeral ones are deleted and not emitted.
    /// Declared ones are kept, gauges and summaries report NaN and counters
    /// their last value.
    pub fn sweep<F>(&self, now: Instant, mut emit: F) -> SweepStats
    where
        F: FnMut(MetricFamily),
    {
        let expiration = self.inner.expiration;
        let window = (!expiration.is_zero()).then_some(expiration);
        let mut stats = SweepStats::default();
        self.inner.gauges.sweep(now, window, &mut emit, &mut stats);
        self.inner.summaries.sweep(now, window, &mut emit, &mut stats);
        self.inner.counters.sweep(now, window, &mut emit, &mut stats);
        tracing::debug!(
            message = "swept metrics",
            emitted = stats.emitted,
            evicted = stats.evicted,
            stale = stats.stale
        );
        stats
    }

    pub fn collect_at(&self, now: Instant) -> Vec<MetricFamily> {
        let mut families = Vec::with_capacity(self.len());
        self.sweep(now, |family| families.push(family));
        families
    }

    /// Number of metrics currently stored, of any kind.
    pub fn len(&self) -> usize {
        self.inner.gauges.len() + self.inner.summaries.len() + self.inner.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expiration(&self) -> Duration {
        self.inner.expiration
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("expiration", &self.inner.expiration)
            .field("metrics", &self.len())
            .finish()
    }
}

impl Collector for Registry {
    /// We must emit some description otherwise registration fails. This
    /// description isn't shown to the user.
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.inner.placeholder]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.collect_at(Instant::now())
    }
}
