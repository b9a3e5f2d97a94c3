use std::time::Duration;

use crate::metrics::summary::DEFAULT_MAX_AGE;

pub const DEFAULT_EXPIRATION: Duration = Duration::from_secs(60);

/// Where a [`crate::Registry`] registers itself as a prometheus collector.
#[derive(Clone, Default)]
pub enum Registerer {
    /// The process wide [`prometheus::default_registry`].
    #[default]
    Default,
    /// A caller supplied prometheus registry.
    Custom(prometheus::Registry),
    /// Do not register anywhere. Used when the registry is handed to a push
    /// transport instead of being scraped.
    Unregistered,
}

/// A metric declared up front. Declared metrics start at zero and are never
/// deleted on expiry:
/// - gauges and summaries are set to NaN when they expire.
/// - counters keep reporting their last known value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDef {
    pub name: Vec<String>,
    pub const_labels: Vec<(String, String)>,
}

impl MetricDef {
    pub fn new<I, S>(name: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into_iter().map(Into::into).collect(),
            const_labels: Vec::new(),
        }
    }

    pub fn with_label(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.const_labels.push((name.into(), value.into()));
        self
    }
}

/// Configuration for a [`crate::Registry`].
#[derive(Clone)]
pub struct Options {
    /// How long a metric stays valid without being reported. Zero disables
    /// expiration entirely.
    pub expiration: Duration,
    pub registerer: Registerer,
    /// Sliding window summaries compute their quantiles over.
    pub summary_max_age: Duration,
    pub gauges: Vec<MetricDef>,
    pub summaries: Vec<MetricDef>,
    pub counters: Vec<MetricDef>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            expiration: DEFAULT_EXPIRATION,
            registerer: Registerer::Default,
            summary_max_age: DEFAULT_MAX_AGE,
            gauges: Vec::new(),
            summaries: Vec::new(),
            counters: Vec::new(),
        }
    }
}

impl Options {
    pub fn with_expiration(mut self, expiration: Duration) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn with_registerer(mut self, registerer: Registerer) -> Self {
        self.registerer = registerer;
        self
    }

    pub fn with_summary_max_age(mut self, max_age: Duration) -> Self {
        self.summary_max_age = max_age;
        self
    }

    pub fn with_gauge(mut self, def: MetricDef) -> Self {
        self.gauges.push(def);
        self
    }

    pub fn with_summary(mut self, def: MetricDef) -> Self {
        self.summaries.push(def);
        self
    }

    pub fn with_counter(mut self, def: MetricDef) -> Self {
        self.counters.push(def);
        self
    }
}
