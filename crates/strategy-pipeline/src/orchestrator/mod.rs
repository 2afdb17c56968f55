//! Pipeline orchestrator
//!
//! Runs Router, Governor and Synthesizer in sequence for one message,
//! tracks the run through `PipelineState`, and writes exactly one audit
//! record per run whether it succeeded or not. `process` never returns an
//! error: every outcome, including a caught panic, is a `PipelineResult`.

pub mod state;

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::config::PipelineConfig;
use crate::contracts::{AuditDraft, AuditStatus, Decision, DecisionDocument, QueryPlan};
use crate::error::{panic_message, AuditError, ErrorCode, PipelineError};
use crate::governor::Governor;
use crate::router::Router;
use crate::synthesizer::Synthesizer;
use crate::telemetry::PipelineMetrics;
pub use state::{PipelineState, StateMachine};

/// Audit id returned when the audit write failed
pub const LOCAL_ONLY: &str = "LOCAL_ONLY";

/// Keys of `PipelineResult::execution_times_ms`
pub mod stages {
    pub const ROUTING: &str = "routing";
    pub const GOVERNING: &str = "governing";
    pub const SYNTHESIZING: &str = "synthesizing";
    pub const AUDITING: &str = "auditing";
    pub const TOTAL: &str = "total";
}

/// Outcome of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineResult {
    pub correlation_id: String,

    /// Store-assigned entry id, or `LOCAL_ONLY`
    pub audit_id: String,

    pub status: AuditStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default)]
    pub warnings: Vec<String>,

    pub query_plan: Option<QueryPlan>,
    pub decision: Option<Decision>,
    pub document: Option<DecisionDocument>,

    pub execution_times_ms: BTreeMap<String, u64>,

    pub final_state: PipelineState,
    pub state_history: Vec<PipelineState>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.status == AuditStatus::Success
    }

    /// Whether the audit record only exists in this result
    pub fn is_local_only(&self) -> bool {
        self.audit_id == LOCAL_ONLY
    }
}

/// A stage that could not produce output
#[derive(Debug)]
struct StageFailure {
    code: ErrorCode,
    error: PipelineError,
}

impl StageFailure {
    fn new(code: ErrorCode, error: PipelineError) -> Self {
        Self { code, error }
    }
}

/// Everything produced so far in one run. Lives outside the stage future so
/// it survives a panic.
struct RunContext {
    correlation_id: String,
    machine: StateMachine,
    query_plan: Option<QueryPlan>,
    decision: Option<Decision>,
    document: Option<DecisionDocument>,
    warnings: Vec<String>,
    times: BTreeMap<String, u64>,
}

impl RunContext {
    fn new(correlation_id: String) -> Self {
        Self {
            correlation_id,
            machine: StateMachine::new(),
            query_plan: None,
            decision: None,
            document: None,
            warnings: Vec::new(),
            times: BTreeMap::new(),
        }
    }

    fn enter(&mut self, next: PipelineState) -> Result<(), StageFailure> {
        self.machine
            .transition(next)
            .map_err(|e| StageFailure::new(ErrorCode::OrchestratorPanic, PipelineError::internal(e)))
    }

    fn produced_anything(&self) -> bool {
        self.query_plan.is_some() || self.decision.is_some() || self.document.is_some()
    }
}

pub struct Orchestrator {
    router: Router,
    governor: Governor,
    synthesizer: Synthesizer,
    sink: Arc<AuditSink>,
    metrics: Option<PipelineMetrics>,
}

impl Orchestrator {
    pub fn new(config: &PipelineConfig, sink: Arc<AuditSink>) -> Self {
        Self {
            router: Router::new(),
            governor: Governor::new(config.policy_mode_version.clone()),
            synthesizer: Synthesizer::new(config),
            sink,
            metrics: None,
        }
    }

    pub fn with_synthesizer(mut self, synthesizer: Synthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn sink(&self) -> &Arc<AuditSink> {
        &self.sink
    }

    /// Run the full pipeline for one message
    pub async fn process(&self, message: &str, actor_id: &str) -> PipelineResult {
        let correlation_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "pipeline",
            correlation_id = %correlation_id,
            actor_id = %actor_id
        );
        self.process_inner(message, actor_id, correlation_id)
            .instrument(span)
            .await
    }

    async fn process_inner(
        &self,
        message: &str,
        actor_id: &str,
        correlation_id: String,
    ) -> PipelineResult {
        let started = Instant::now();
        let event_at = Utc::now();
        let mut ctx = RunContext::new(correlation_id);

        let outcome = AssertUnwindSafe(self.run(message, &mut ctx))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(failure)) => Some(failure),
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                tracing::error!(panic = %detail, state = %ctx.machine.current(), "Pipeline panicked");
                Some(StageFailure::new(
                    ErrorCode::OrchestratorPanic,
                    PipelineError::internal(format!("pipeline panicked: {}", detail)),
                ))
            }
        };

        let status = match &failure {
            None => AuditStatus::Success,
            Some(f) if f.code == ErrorCode::OrchestratorPanic => AuditStatus::Error,
            Some(_) if ctx.produced_anything() => AuditStatus::Partial,
            Some(_) => AuditStatus::Error,
        };

        match &failure {
            None => {
                if let Err(e) = ctx.machine.transition(PipelineState::Auditing) {
                    tracing::error!(error = %e, "Could not enter auditing state");
                }
            }
            Some(f) => {
                tracing::error!(code = %f.code, error = %f.error, "Pipeline failed");
                if let Err(e) = ctx.machine.transition(PipelineState::Failed) {
                    tracing::error!(error = %e, "Could not enter failed state");
                }
            }
        }

        let draft = AuditDraft {
            event_at,
            correlation_id: ctx.correlation_id.clone(),
            actor_id: actor_id.to_string(),
            message: message.to_string(),
            query_plan: ctx.query_plan.clone(),
            decision: ctx.decision.clone(),
            document: ctx.document.clone(),
            status,
            error_message: failure
                .as_ref()
                .map(|f| format!("{}: {}", f.code, f.error)),
            warnings: ctx.warnings.clone(),
            routing_ms: ctx.times.get(stages::ROUTING).copied(),
            governing_ms: ctx.times.get(stages::GOVERNING).copied(),
            synthesizing_ms: ctx.times.get(stages::SYNTHESIZING).copied(),
            total_ms: elapsed_ms(started),
        };

        let audit_started = Instant::now();
        let audit_id = match self.persist(draft).await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Audit write failed, result kept locally");
                if let Some(metrics) = &self.metrics {
                    metrics.record_audit_failure();
                }
                ctx.warnings.push(format!("audit write failed: {}", e));
                LOCAL_ONLY.to_string()
            }
        };
        self.record_stage(&mut ctx, stages::AUDITING, audit_started);

        if failure.is_none() {
            if let Err(e) = ctx.machine.transition(PipelineState::Completed) {
                tracing::error!(error = %e, "Could not enter completed state");
            }
        }

        ctx.times.insert(stages::TOTAL.to_string(), elapsed_ms(started));
        if let Some(metrics) = &self.metrics {
            metrics.record_request(status);
        }

        tracing::info!(
            status = %status,
            audit_id = %audit_id,
            total_ms = ctx.times.get(stages::TOTAL).copied().unwrap_or_default(),
            "Pipeline finished"
        );

        PipelineResult {
            correlation_id: ctx.correlation_id,
            audit_id,
            status,
            error_code: failure.as_ref().map(|f| f.code),
            error: failure.map(|f| f.error.to_string()),
            warnings: ctx.warnings,
            query_plan: ctx.query_plan,
            decision: ctx.decision,
            document: ctx.document,
            execution_times_ms: ctx.times,
            final_state: ctx.machine.current(),
            state_history: ctx.machine.history().to_vec(),
        }
    }

    /// Router, Governor, Synthesizer. Outputs are stored on `ctx` as soon as
    /// each stage produces them.
    async fn run(&self, message: &str, ctx: &mut RunContext) -> Result<(), StageFailure> {
        ctx.enter(PipelineState::Routing)?;
        let stage_started = Instant::now();
        let routed = self.router.route(message);
        self.record_stage(ctx, stages::ROUTING, stage_started);
        let plan = routed
            .map_err(|e| StageFailure::new(ErrorCode::RouterFailed, e))?
            .with_correlation_id(ctx.correlation_id.clone());
        ctx.query_plan = Some(plan.clone());

        ctx.enter(PipelineState::Governing)?;
        let stage_started = Instant::now();
        let evaluated = self.governor.evaluate(&plan);
        self.record_stage(ctx, stages::GOVERNING, stage_started);
        let decision = evaluated.map_err(|e| StageFailure::new(ErrorCode::GovernorFailed, e))?;
        ctx.decision = Some(decision.clone());

        ctx.enter(PipelineState::Synthesizing)?;
        let stage_started = Instant::now();
        let synthesized = self.synthesizer.synthesize(&plan, &decision).await;
        self.record_stage(ctx, stages::SYNTHESIZING, stage_started);
        let outcome =
            synthesized.map_err(|e| StageFailure::new(ErrorCode::SynthesizerFailed, e))?;

        if let Some(metrics) = &self.metrics {
            metrics.record_retries(outcome.attempts.saturating_sub(1));
        }
        if let Some(reason) = &outcome.recovered_from {
            tracing::warn!(reason = %reason, "Synthesizer returned degraded output");
            if let Some(metrics) = &self.metrics {
                metrics.record_degraded();
            }
            ctx.warnings
                .push(format!("{}: {}", DecisionDocument::DEGRADED_FLAG, reason));
        }
        ctx.document = Some(outcome.document);

        Ok(())
    }

    async fn persist(&self, draft: AuditDraft) -> Result<String, AuditError> {
        let sink = Arc::clone(&self.sink);
        tokio::task::spawn_blocking(move || sink.persist(draft))
            .await
            .map_err(|e| AuditError::Unavailable(format!("audit task failed: {}", e)))?
    }

    fn record_stage(&self, ctx: &mut RunContext, stage: &str, started: Instant) {
        let elapsed = started.elapsed();
        ctx.times
            .insert(stage.to_string(), elapsed.as_millis() as u64);
        if let Some(metrics) = &self.metrics {
            metrics.observe_stage(stage, elapsed.as_secs_f64());
        }
        tracing::debug!(stage = stage, elapsed_ms = elapsed.as_millis() as u64, "Stage finished");
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("governor", &self.governor)
            .field("synthesizer", &self.synthesizer)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
