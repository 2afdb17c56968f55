//! HTTP surface for the strategic decision pipeline
//!
//! One `Orchestrator` is built at startup and shared with every handler
//! through axum `State`.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use strategy_pipeline::contracts::{AuditRecord, AuditSummary};
use strategy_pipeline::{
    AuditError, AuditSink, AuditStore, Orchestrator, PipelineConfig, PipelineMetricsRegistry,
    PipelineResult, SqliteAuditStore, Verification, PIPELINE_VERSION,
};

/// Actor recorded when a request does not name one
pub const ANONYMOUS_ACTOR: &str = "anonymous";

/// History page size when `limit` is omitted
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Application state
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub metrics: PipelineMetricsRegistry,
}

impl AppState {
    /// Build the pipeline on the SQLite store named by `config`
    pub fn from_config(config: &PipelineConfig) -> anyhow::Result<Self> {
        let store = Arc::new(SqliteAuditStore::open(&config.audit_db_path)?);
        Self::with_store(config, store)
    }

    pub fn with_store(config: &PipelineConfig, store: Arc<dyn AuditStore>) -> anyhow::Result<Self> {
        let sink = Arc::new(AuditSink::new(config, store)?);
        let metrics = PipelineMetricsRegistry::new()?;
        let orchestrator =
            Orchestrator::new(config, sink).with_metrics(metrics.pipeline().clone());
        Ok(Self {
            orchestrator,
            metrics,
        })
    }

    pub fn sink(&self) -> &Arc<AuditSink> {
        self.orchestrator.sink()
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/api/v1/decisions", post(create_decision))
        .route("/api/v1/audit/records/:correlation_id", get(get_record))
        .route(
            "/api/v1/audit/records/:correlation_id/verify",
            get(verify_record),
        )
        .route("/api/v1/audit/actors/:actor_id", get(actor_history))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "strategy-gateway".to_string(),
        version: PIPELINE_VERSION.to_string(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode_text() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "MetricsUnavailable", e)
                .into_response()
        }
    }
}

/// Run one message through the pipeline. Stage failures are reported inside
/// the result; only malformed requests are rejected here.
async fn create_decision(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecisionRequest>,
) -> ApiResult<PipelineResult> {
    let actor_id = request
        .actor_id
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| ANONYMOUS_ACTOR.to_string());

    if request.message.chars().count() > DecisionRequest::MAX_MESSAGE_CHARS {
        return Err(ApiError::response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "InvalidInput",
            format!(
                "message exceeds {} characters",
                DecisionRequest::MAX_MESSAGE_CHARS
            ),
        ));
    }

    let result = state.orchestrator.process(&request.message, &actor_id).await;
    Ok(Json(result))
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    Path(correlation_id): Path<String>,
) -> ApiResult<AuditRecord> {
    let record = lookup(&state, &correlation_id).await?;
    Ok(Json(record))
}

async fn verify_record(
    State(state): State<Arc<AppState>>,
    Path(correlation_id): Path<String>,
) -> ApiResult<VerifyResponse> {
    let record = lookup(&state, &correlation_id).await?;
    let verification = state.sink().verify(&record);
    Ok(Json(VerifyResponse {
        correlation_id,
        entry_id: record.entry_id,
        intact: verification.is_intact(),
        verification,
    }))
}

async fn actor_history(
    State(state): State<Arc<AppState>>,
    Path(actor_id): Path<String>,
    Query(params): Query<HistoryParams>,
) -> ApiResult<Vec<AuditSummary>> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    let sink = state.sink().clone();
    let summaries = tokio::task::spawn_blocking(move || sink.get_recent_by_actor(&actor_id, limit))
        .await
        .map_err(|e| ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "TaskFailed", e))?
        .map_err(audit_error)?;
    Ok(Json(summaries))
}

async fn lookup(
    state: &AppState,
    correlation_id: &str,
) -> Result<AuditRecord, (StatusCode, Json<ApiError>)> {
    let sink = state.sink().clone();
    let id = correlation_id.to_string();
    tokio::task::spawn_blocking(move || sink.get_by_correlation_id(&id))
        .await
        .map_err(|e| ApiError::response(StatusCode::INTERNAL_SERVER_ERROR, "TaskFailed", e))?
        .map_err(audit_error)?
        .ok_or_else(|| {
            ApiError::response(
                StatusCode::NOT_FOUND,
                "NotFound",
                format!("no audit record for correlation id {}", correlation_id),
            )
        })
}

fn audit_error(error: AuditError) -> (StatusCode, Json<ApiError>) {
    tracing::error!(error = %error, "Audit read failed");
    let status = match error {
        AuditError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    ApiError::response(status, "AuditError", error)
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// Decision request
#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub message: String,
    pub actor_id: Option<String>,
}

impl DecisionRequest {
    pub const MAX_MESSAGE_CHARS: usize = 10_000;
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub correlation_id: String,
    pub entry_id: String,
    pub intact: bool,
    pub verification: Verification,
}

/// API error
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub request_id: Option<Uuid>,
}

impl ApiError {
    fn response(
        status: StatusCode,
        error: &str,
        message: impl ToString,
    ) -> (StatusCode, Json<ApiError>) {
        (
            status,
            Json(ApiError {
                error: error.to_string(),
                message: message.to_string(),
                request_id: Some(Uuid::new_v4()),
            }),
        )
    }
}
