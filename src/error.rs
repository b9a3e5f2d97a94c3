/// Errors surfaced while setting up a registry or pushing it somewhere.
/// Reporting a metric never fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to build placeholder descriptor: {0}")]
    Describe(#[source] prometheus::Error),

    #[error("failed to register metrics registry: {0}")]
    Register(#[source] prometheus::Error),

    #[error("failed to push metrics to {address}: {source}")]
    Push {
        address: String,
        #[source]
        source: prometheus::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
