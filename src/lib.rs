//! promsink bridges push style instrumentation (gauges, counters and timing
//! samples reported as they happen) to prometheus' pull style collection.
//!
//! let registry = promsink::Registry::new()?;
//! registry.set_gauge_with_labels(&["consul", "memberlist.size"], 3.0, &[("dc", "east")]);
//! registry.incr_counter(&["consul", "rpc", "request"], 1.0);
//!
//! Every report looks up or lazily creates the metric it names. Whenever the
//! registry is collected, metrics nobody reported within the expiration window
//! are dealt with: the ones created by reports are deleted, the ones declared
//! up front in [`Options`] are kept but marked stale.

mod error;
mod exporter;
pub mod key;
pub mod metrics;
mod options;
mod registry;
pub mod runtime;
mod sink;
mod utils;

pub use error::{Error, Result};
pub use exporter::{GatewayPusher, PushExporter, Pusher};
pub use options::{MetricDef, Options, Registerer, DEFAULT_EXPIRATION};
pub use registry::{Registry, SweepStats};
pub use sink::MetricSink;
