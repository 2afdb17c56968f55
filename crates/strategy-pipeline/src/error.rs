//! Error types for the strategy pipeline
//!
//! Provides structured error types for contract validation, stage failures
//! and audit persistence.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Error codes attached to validation failures, one per producing stage
pub mod codes {
    pub const ROUTER_VALIDATION_FAILED: &str = "ROUTER_VALIDATION_FAILED";
    pub const GOVERNOR_VALIDATION_FAILED: &str = "GOVERNOR_VALIDATION_FAILED";
    pub const SYNTHESIZER_VALIDATION_FAILED: &str = "SYNTHESIZER_VALIDATION_FAILED";
    pub const AUDIT_VALIDATION_FAILED: &str = "AUDIT_VALIDATION_FAILED";
}

/// A contract invariant that did not hold
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{contract}: {reason}")]
pub struct ValidationFailure {
    /// Contract that was checked (e.g. "QueryPlan")
    pub contract: &'static str,
    /// Human-readable description of the violated invariant
    pub reason: String,
}

impl ValidationFailure {
    pub fn new(contract: &'static str, reason: impl Into<String>) -> Self {
        Self {
            contract,
            reason: reason.into(),
        }
    }
}

/// Main error type for pipeline stages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// A stage produced output violating its own contract
    #[error("[{code}] {failure}")]
    Validation {
        code: &'static str,
        failure: ValidationFailure,
    },

    /// Router could not produce a plan
    #[error("Router error: {0}")]
    Router(String),

    /// Governor could not produce a decision
    #[error("Governor error: {0}")]
    Governor(String),

    /// Synthesizer could not produce a document
    #[error("Synthesizer error: {0}")]
    Synthesizer(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broken pipeline invariant or caught panic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    /// Create a validation error
    pub fn validation(code: &'static str, failure: ValidationFailure) -> Self {
        PipelineError::Validation { code, failure }
    }

    /// Create a router error
    pub fn router(msg: impl Into<String>) -> Self {
        PipelineError::Router(msg.into())
    }

    /// Create a governor error
    pub fn governor(msg: impl Into<String>) -> Self {
        PipelineError::Governor(msg.into())
    }

    /// Create a synthesizer error
    pub fn synthesizer(msg: impl Into<String>) -> Self {
        PipelineError::Synthesizer(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        PipelineError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        PipelineError::Internal(msg.into())
    }

    /// Check if this is a contract validation failure
    pub fn is_validation(&self) -> bool {
        matches!(self, PipelineError::Validation { .. })
    }
}

/// Stage-identifying status codes reported by the Orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RouterFailed,
    GovernorFailed,
    SynthesizerFailed,
    OrchestratorPanic,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::RouterFailed => "router_failed",
            ErrorCode::GovernorFailed => "governor_failed",
            ErrorCode::SynthesizerFailed => "synthesizer_failed",
            ErrorCode::OrchestratorPanic => "orchestrator_panic",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the audit sink and its store
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Write rejected because the record already exists
    #[error("Audit record {0} already exists and is immutable")]
    ImmutableRecord(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("[AUDIT_VALIDATION_FAILED] {0}")]
    Validation(ValidationFailure),

    /// Stored data could not be decoded
    #[error("Corrupt audit row: {0}")]
    Corrupt(String),

    #[error("Audit store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Text carried by a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run a synchronous stage body; a panic becomes that stage's own error
pub(crate) fn contain_panic<T>(
    stage_error: fn(String) -> PipelineError,
    body: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match std::panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = panic_message(payload.as_ref());
            tracing::error!(panic = %detail, "Stage panicked");
            Err(stage_error(format!("internal error: {}", detail)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PipelineError::validation(
            codes::ROUTER_VALIDATION_FAILED,
            ValidationFailure::new("QueryPlan", "domains_selected is empty"),
        );
        assert_eq!(
            err.to_string(),
            "[ROUTER_VALIDATION_FAILED] QueryPlan: domains_selected is empty"
        );
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(PipelineError::router("x"), PipelineError::Router(_)));
        assert!(matches!(PipelineError::governor("x"), PipelineError::Governor(_)));
        assert!(!PipelineError::synthesizer("x").is_validation());
    }

    #[test]
    fn test_error_code_serialization() {
        assert_eq!(
            serde_json::to_string(&ErrorCode::OrchestratorPanic).unwrap(),
            "\"orchestrator_panic\""
        );
        assert_eq!(ErrorCode::RouterFailed.to_string(), "router_failed");
    }

    #[test]
    fn test_contain_panic_maps_to_stage_error() {
        let err = contain_panic::<()>(PipelineError::Router, || panic!("keyword table broken"))
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::Router("internal error: keyword table broken".to_string())
        );

        let ok = contain_panic(PipelineError::Governor, || Ok(7));
        assert_eq!(ok, Ok(7));

        let passthrough = contain_panic::<()>(PipelineError::Router, || {
            Err(PipelineError::config("bad"))
        });
        assert_eq!(passthrough, Err(PipelineError::config("bad")));
    }

    #[test]
    fn test_audit_validation_display() {
        let err = AuditError::Validation(ValidationFailure::new("AuditRecord", "bad"));
        assert_eq!(err.to_string(), "[AUDIT_VALIDATION_FAILED] AuditRecord: bad");
    }
}
