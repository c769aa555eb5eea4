//! Observability for the redelivery processor
//!
//! - Structured logging through `tracing`; the subscriber is installed once
//!   by the binary (or by a host) with [`init_logging`]
//! - Lock-free counters in [`RedeliveryMetrics`]
//!
//! Observability never changes processing outcomes.

mod metrics;

pub use metrics::{MetricsSnapshot, RedeliveryMetrics};

use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `default_filter`.
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(format: LogFormat, default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
