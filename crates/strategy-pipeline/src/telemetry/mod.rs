//! Telemetry for the strategy pipeline
//!
//! - `metrics` - Prometheus counters and histograms for pipeline runs

pub mod metrics;

pub use metrics::{PipelineMetrics, PipelineMetricsRegistry};

use thiserror::Error;

/// Telemetry errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("Metrics encoding error: {0}")]
    Encoding(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
