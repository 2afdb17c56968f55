//! HTTP tests for the strategy gateway

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use strategy_gateway::{create_router, AppState};
use strategy_pipeline::{PipelineConfig, SqliteAuditStore};

fn state() -> Arc<AppState> {
    let store = Arc::new(SqliteAuditStore::open_in_memory().expect("store"));
    let config = PipelineConfig::builder().signing_secret("gateway-secret").build();
    Arc::new(AppState::with_store(&config, store).expect("state"))
}

async fn send(state: &Arc<AppState>, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = create_router(state.clone())
        .oneshot(request)
        .await
        .expect("response");
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, body.to_vec())
}

async fn get_json(state: &Arc<AppState>, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).expect("json"))
}

async fn decide(state: &Arc<AppState>, payload: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/decisions")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let (status, body) = send(state, request).await;
    (status, serde_json::from_slice(&body).expect("json"))
}

#[test]
fn test_state_requires_signing_secret() {
    let store = Arc::new(SqliteAuditStore::open_in_memory().expect("store"));
    assert!(AppState::with_store(&PipelineConfig::default(), store).is_err());
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get_json(&state(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "strategy-gateway");
}

#[tokio::test]
async fn test_decision_is_processed_and_audited() {
    let state = state();
    let (status, result) = decide(
        &state,
        json!({
            "message": "¿Es buen momento para solicitar excedencia en CGI?",
            "actor_id": "ana"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["status"], "success");
    assert_eq!(result["final_state"], "completed");
    assert_eq!(result["decision"]["recommendation"], "postpone");

    let correlation_id = result["correlation_id"].as_str().unwrap();
    let (status, record) =
        get_json(&state, &format!("/api/v1/audit/records/{}", correlation_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["entry_id"], result["audit_id"]);
    assert_eq!(record["actor_id"], "ana");

    let (status, verify) = get_json(
        &state,
        &format!("/api/v1/audit/records/{}/verify", correlation_id),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(verify["intact"], true);
}

#[tokio::test]
async fn test_missing_actor_is_anonymous() {
    let state = state();
    let (_, result) = decide(&state, json!({ "message": "precio de la villa" })).await;
    assert_eq!(result["status"], "success");

    let (_, history) = get_json(&state, "/api/v1/audit/actors/anonymous").await;
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["correlation_id"], result["correlation_id"]);
}

#[tokio::test]
async fn test_actor_history_honours_limit() {
    let state = state();
    for _ in 0..3 {
        decide(
            &state,
            json!({ "message": "precio de la villa", "actor_id": "bea" }),
        )
        .await;
    }

    let (status, history) = get_json(&state, "/api/v1/audit/actors/bea?limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (_, history) = get_json(&state, "/api/v1/audit/actors/bea?limit=0").await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_record_is_not_found() {
    let (status, body) = get_json(&state(), "/api/v1/audit/records/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}

#[tokio::test]
async fn test_oversized_message_rejected() {
    let message = "a".repeat(strategy_gateway::DecisionRequest::MAX_MESSAGE_CHARS + 1);
    let (status, body) = decide(&state(), json!({ "message": message })).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "InvalidInput");
}

#[tokio::test]
async fn test_metrics_exposed_after_request() {
    let state = state();
    decide(&state, json!({ "message": "precio de la villa" })).await;

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&state, request).await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("strategy_pipeline_requests_total"));
    assert!(text.contains("strategy_pipeline_stage_duration_seconds"));
}
