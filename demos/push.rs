use std::time::Duration;

use promsink::{MetricDef, Options, PushExporter, Registerer, Registry};

const REQUESTS: &[&str] = &["promsink", "demo", "requests"];
const LATENCY: &[&str] = &["promsink", "demo", "latency_ms"];
const INFLIGHT: &[&str] = &["promsink", "demo", "inflight"];

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let address = std::env::var("PUSHGATEWAY").unwrap_or_else(|_| "127.0.0.1:9091".into());

    let registry = Registry::with_options(
        Options::default()
            .with_expiration(Duration::from_secs(5))
            .with_registerer(Registerer::Unregistered)
            .with_gauge(MetricDef::new(INFLIGHT.iter().copied())),
    )?;
    let exporter = PushExporter::start(
        registry.clone(),
        std::sync::Arc::new(promsink::GatewayPusher::new(address, "promsink-demo")),
        Duration::from_secs(1),
    );
    tokio::spawn(promsink::runtime::export_task(
        registry.clone(),
        Duration::from_secs(10),
    ));

    let mut ticker = tokio::time::interval(Duration::from_millis(500));
    for i in 0..20u32 {
        ticker.tick().await;
        registry.incr_counter_with_labels(REQUESTS, 1.0, &[("status", "ok")]);
        registry.add_sample(LATENCY, (i % 7) as f32 * 3.5);
        if i < 5 {
            registry.set_gauge(INFLIGHT, i as f32);
        }
    }
    let families = prometheus::core::Collector::collect(&registry);
    let text = prometheus::TextEncoder::new().encode_to_string(&families)?;
    println!("{text}");
    exporter.shutdown().await?;
    Ok(())
}
