//! Prometheus metrics for pipeline runs
//!
//! - `pipeline_requests_total` (counter) - Runs by final status
//! - `pipeline_stage_duration_seconds` (histogram) - Per-stage duration
//! - `pipeline_degraded_total` (counter) - Degraded documents returned
//! - `pipeline_audit_write_failures_total` (counter) - Failed audit writes
//! - `pipeline_synthesizer_retries_total` (counter) - Composer retries

use prometheus::{Counter, CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::sync::Arc;

use super::{Result, TelemetryError};
use crate::contracts::AuditStatus;

const NAMESPACE: &str = "strategy";

#[derive(Clone)]
pub struct PipelineMetrics {
    requests_total: CounterVec,
    stage_duration_seconds: HistogramVec,
    degraded_total: Counter,
    audit_write_failures_total: Counter,
    synthesizer_retries_total: Counter,
}

impl PipelineMetrics {
    /// Create the metrics and register them with `registry`
    pub fn new(registry: &Registry) -> Result<Self> {
        let requests_total = CounterVec::new(
            Opts::new("pipeline_requests_total", "Pipeline runs by final status")
                .namespace(NAMESPACE),
            &["status"],
        )?;

        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "pipeline_stage_duration_seconds",
                "Duration of each pipeline stage in seconds",
            )
            .namespace(NAMESPACE)
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["stage"],
        )?;

        let degraded_total = Counter::with_opts(
            Opts::new(
                "pipeline_degraded_total",
                "Documents returned in degraded mode",
            )
            .namespace(NAMESPACE),
        )?;

        let audit_write_failures_total = Counter::with_opts(
            Opts::new(
                "pipeline_audit_write_failures_total",
                "Audit records that could not be persisted",
            )
            .namespace(NAMESPACE),
        )?;

        let synthesizer_retries_total = Counter::with_opts(
            Opts::new(
                "pipeline_synthesizer_retries_total",
                "Composer attempts beyond the first",
            )
            .namespace(NAMESPACE),
        )?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(stage_duration_seconds.clone()))?;
        registry.register(Box::new(degraded_total.clone()))?;
        registry.register(Box::new(audit_write_failures_total.clone()))?;
        registry.register(Box::new(synthesizer_retries_total.clone()))?;

        Ok(Self {
            requests_total,
            stage_duration_seconds,
            degraded_total,
            audit_write_failures_total,
            synthesizer_retries_total,
        })
    }

    pub fn record_request(&self, status: AuditStatus) {
        self.requests_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn observe_stage(&self, stage: &str, duration_secs: f64) {
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(duration_secs);
    }

    pub fn record_degraded(&self) {
        self.degraded_total.inc();
    }

    pub fn record_audit_failure(&self) {
        self.audit_write_failures_total.inc();
    }

    pub fn record_retries(&self, retries: u32) {
        if retries > 0 {
            self.synthesizer_retries_total.inc_by(f64::from(retries));
        }
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics").finish_non_exhaustive()
    }
}

/// Registry owning the pipeline metrics
pub struct PipelineMetricsRegistry {
    registry: Arc<Registry>,
    pipeline: PipelineMetrics,
}

impl PipelineMetricsRegistry {
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Register the pipeline metrics on an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let pipeline = PipelineMetrics::new(&registry)?;
        Ok(Self { registry, pipeline })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn pipeline(&self) -> &PipelineMetrics {
        &self.pipeline
    }

    /// Encode metrics as text for scraping
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}
