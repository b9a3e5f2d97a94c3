//! Provide simple tokio runtime metrics. Spawn [`export_task`] next to your
//! exporter to get runtime gauges for "free".

use std::time::Duration;

use tokio::runtime::Handle;

use crate::Registry;

mod metrics {
    pub const TOKIO_ALIVE_TASKS: &[&str] = &["tokio", "tasks"];
    pub const TOKIO_WORKERS: &[&str] = &["tokio", "workers"];
    pub const TOKIO_GLOBAL_QUEUE_DEPTH: &[&str] = &["tokio", "global_queue_depth"];
}

/// Report the current state of the runtime behind `handle`.
pub fn record(registry: &Registry, handle: &Handle) {
    let stats = handle.metrics();
    registry.set_gauge_with_labels(
        metrics::TOKIO_ALIVE_TASKS,
        stats.num_alive_tasks() as f32,
        &[("state", "alive")],
    );
    registry.set_gauge(metrics::TOKIO_WORKERS, stats.num_workers() as f32);
    registry.set_gauge(
        metrics::TOKIO_GLOBAL_QUEUE_DEPTH,
        stats.global_queue_depth() as f32,
    );
}

/// Report runtime metrics into `registry` every `period`, forever.
pub async fn export_task(registry: Registry, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        record(&registry, &Handle::current());
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{Options, Registerer};

    fn registry() -> Registry {
        Registry::with_options(Options::default().with_registerer(Registerer::Unregistered))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn records_runtime_gauges() {
        let registry = registry();
        record(&registry, &Handle::current());
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&registry.collect_at(Instant::now()))
            .unwrap();
        assert!(text.contains("tokio_workers 2\n"), "{text}");
        assert!(text.contains("tokio_tasks{state=\"alive\"}"), "{text}");
        assert!(text.contains("tokio_global_queue_depth"), "{text}");
    }

    #[tokio::test]
    async fn export_task_reports() {
        let registry = registry();
        let task = tokio::spawn(export_task(registry.clone(), Duration::from_millis(10)));
        tokio::time::sleep(Duration::from_millis(30)).await;
        task.abort();
        assert_eq!(registry.len(), 3);
    }
}
