/// The reporting side of an instrumentation library: something metrics are
/// pushed into as they happen. None of these can fail.
pub trait MetricSink {
    fn set_gauge_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]);

    fn incr_counter_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]);

    fn add_sample_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]);

    /// Prometheus works with a pull model and has no type retaining an
    /// arbitrary number of values, so key emissions are dropped.
    fn emit_key(&self, _key: &[&str], _val: f32) {}

    fn set_gauge(&self, key: &[&str], val: f32) {
        self.set_gauge_with_labels(key, val, &[]);
    }

    fn incr_counter(&self, key: &[&str], val: f32) {
        self.incr_counter_with_labels(key, val, &[]);
    }

    fn add_sample(&self, key: &[&str], val: f32) {
        self.add_sample_with_labels(key, val, &[]);
    }
}

impl MetricSink for crate::Registry {
    fn set_gauge_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]) {
        crate::Registry::set_gauge_with_labels(self, key, val, labels);
    }

    fn incr_counter_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]) {
        crate::Registry::incr_counter_with_labels(self, key, val, labels);
    }

    fn add_sample_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]) {
        crate::Registry::add_sample_with_labels(self, key, val, labels);
    }
}

impl MetricSink for crate::PushExporter {
    fn set_gauge_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]) {
        self.registry().set_gauge_with_labels(key, val, labels);
    }

    fn incr_counter_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]) {
        self.registry().incr_counter_with_labels(key, val, labels);
    }

    fn add_sample_with_labels(&self, key: &[&str], val: f32, labels: &[(&str, &str)]) {
        self.registry().add_sample_with_labels(key, val, labels);
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::{Options, Registerer, Registry};

    fn instrument(sink: &impl MetricSink) {
        sink.set_gauge(&["consul", "memberlist.size"], 3.0);
        sink.incr_counter(&["consul", "rpc", "request"], 1.0);
        sink.add_sample_with_labels(&["consul", "raft", "commit"], 2.5, &[("dc", "east")]);
        sink.emit_key(&["consul", "ignored"], 1.0);
    }

    #[test]
    fn registry_is_a_sink() {
        let registry =
            Registry::with_options(Options::default().with_registerer(Registerer::Unregistered))
                .unwrap();
        instrument(&registry);
        assert_eq!(registry.len(), 3);
        let text = prometheus::TextEncoder::new()
            .encode_to_string(&registry.collect_at(Instant::now()))
            .unwrap();
        assert!(text.contains("consul_memberlist_size 3\n"), "{text}");
        assert!(text.contains("consul_rpc_request 1\n"), "{text}");
        assert!(text.contains("consul_raft_commit_sum{dc=\"east\"} 2.5\n"), "{text}");
        assert!(!text.contains("ignored"), "{text}");
    }

    #[tokio::test]
    async fn exporter_is_a_sink() {
        let exporter = crate::PushExporter::new("127.0.0.1:1", Duration::from_secs(3600), "test")
            .unwrap();
        // Four of those are the exporter's own declared metrics.
        assert_eq!(exporter.registry().len(), 4);
        instrument(&exporter);
        assert_eq!(exporter.registry().len(), 7);
        exporter.shutdown().await.unwrap();
    }
}
