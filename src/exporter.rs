use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use prometheus::core::Collector;
use tokio::{
    sync::oneshot,
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};

use crate::{
    error::{Error, Result},
    options::{MetricDef, Options, Registerer},
    registry::Registry,
};

pub(crate) mod metrics {
    pub const PUSHES: &[&str] = &["promsink", "exporter", "pushes"];
    pub const PUSH_LATENCY_MS: &[&str] = &["promsink", "exporter", "push_latency_ms"];
    pub const REGISTERED_METRICS: &[&str] = &["promsink", "registry", "metrics"];
}

/// Something able to hand a whole [`Registry`] to a remote collector. Pushes
/// are blocking, the exporter runs them on tokio's blocking pool.
pub trait Pusher: Send + Sync + 'static {
    fn push(&self, registry: &Registry) -> Result<()>;
}

/// Pushes to a prometheus push gateway under a job name.
#[derive(Debug, Clone)]
pub struct GatewayPusher {
    address: String,
    job: String,
}

impl GatewayPusher {
    pub fn new(address: impl Into<String>, job: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            job: job.into(),
        }
    }
}

impl Pusher for GatewayPusher {
    fn push(&self, registry: &Registry) -> Result<()> {
        let collector: Box<dyn Collector> = Box::new(registry.clone());
        prometheus::push_collector(&self.job, HashMap::new(), &self.address, vec![collector], None)
            .map_err(|source| Error::Push {
                address: self.address.clone(),
                source,
            })
    }
}

/// Periodically pushes a [`Registry`] somewhere until shut down. A failed push
/// is logged and the next tick simply tries again.
pub struct PushExporter {
    registry: Registry,
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl PushExporter {
    /// Push a fresh registry with the default options to the push gateway at
    /// `address` every `interval`. The registry is not registered with the
    /// process wide prometheus registry.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(address: &str, interval: Duration, job: &str) -> Result<Self> {
        let opts = Options::default().with_registerer(Registerer::Unregistered);
        let registry = Registry::with_options(Self::declare_self_metrics(opts))?;
        Ok(Self::start(
            registry,
            Arc::new(GatewayPusher::new(address, job)),
            interval,
        ))
    }

    /// Declare the metrics the exporter reports about itself, so they survive
    /// expiration windows shorter than the push interval.
    pub fn declare_self_metrics(opts: Options) -> Options {
        let pushes = MetricDef::new(metrics::PUSHES.iter().copied());
        opts.with_counter(pushes.clone().with_label("status", "ok"))
            .with_counter(pushes.with_label("status", "error"))
            .with_summary(MetricDef::new(metrics::PUSH_LATENCY_MS.iter().copied()))
            .with_gauge(MetricDef::new(metrics::REGISTERED_METRICS.iter().copied()))
    }

    /// Start pushing `registry` through `pusher` every `interval`, the first
    /// push happens one interval from now. Build `registry` with
    /// [`PushExporter::declare_self_metrics`] to keep the exporter's own
    /// metrics from expiring between pushes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(registry: Registry, pusher: Arc<dyn Pusher>, interval: Duration) -> Self {
        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(push_loop(registry.clone(), pusher, interval, stopped));
        Self {
            registry,
            stop,
            task,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Stop pushing. No push is started once the signal is observed, one that
    /// is already running is allowed to finish. Await the returned handle to
    /// wait for that.
    ///
    /// Dropping the exporter stops it as well.
    pub fn shutdown(self) -> JoinHandle<()> {
        // The loop only exits on this signal, so the receiver is alive unless
        // the task panicked.
        let _ = self.stop.send(());
        self.task
    }
}

impl std::fmt::Debug for PushExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushExporter")
            .field("registry", &self.registry)
            .finish()
    }
}

async fn push_loop(
    registry: Registry,
    pusher: Arc<dyn Pusher>,
    interval: Duration,
    mut stopped: oneshot::Receiver<()>,
) {
    let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            // Either an explicit stop or the exporter was dropped.
            _ = &mut stopped => {
                tracing::debug!(message = "push exporter stopped");
                return;
            }
            _ = ticker.tick() => {}
        }

        registry.set_gauge(metrics::REGISTERED_METRICS, registry.len() as f32);
        let push_start = Instant::now();
        let push_res = {
            let registry = registry.clone();
            let pusher = pusher.clone();
            tokio::task::spawn_blocking(move || pusher.push(&registry)).await
        };
        let push_dur = push_start.elapsed();
        let status = match push_res {
            Ok(Ok(())) => {
                tracing::debug!(
                    message = "pushed metrics",
                    duration = ?push_dur,
                    metrics = registry.len()
                );
                "ok"
            }
            Ok(Err(e)) => {
                tracing::error!(message = "failed to push metrics", error = %e);
                "error"
            }
            Err(e) => {
                tracing::error!(message = "metrics push task failed", error = %e);
                "error"
            }
        };
        registry.incr_counter_with_labels(metrics::PUSHES, 1.0, &[("status", status)]);
        registry.add_sample(metrics::PUSH_LATENCY_MS, push_dur.as_secs_f32() * 1000.0);
    }
}
