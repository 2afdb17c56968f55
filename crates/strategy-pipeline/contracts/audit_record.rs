//! AuditRecord: the persisted, append-only record of one pipeline execution
//!
//! # Design Principles
//!
//! - **Append-only**: records are inserted once and never updated or deleted
//! - **Tamper-evident**: each record carries a checksum and a keyed signature
//! - **Complete**: full JSON snapshots of every stage output that was produced

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Decision, DecisionDocument, QueryPlan};

/// Outcome stored with the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Success,
    Error,
    Partial,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Error => "error",
            AuditStatus::Partial => "partial",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditStatus::Success),
            "error" => Ok(AuditStatus::Error),
            "partial" => Ok(AuditStatus::Partial),
            other => Err(format!("unknown audit status: {}", other)),
        }
    }
}

/// Everything the Orchestrator knows about one execution, before the sink
/// assigns ids, timestamps and integrity values.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub event_at: DateTime<Utc>,
    pub correlation_id: String,
    pub actor_id: String,
    pub message: String,
    pub query_plan: Option<QueryPlan>,
    pub decision: Option<Decision>,
    pub document: Option<DecisionDocument>,
    pub status: AuditStatus,
    pub error_message: Option<String>,
    pub warnings: Vec<String>,
    pub routing_ms: Option<u64>,
    pub governing_ms: Option<u64>,
    pub synthesizing_ms: Option<u64>,
    pub total_ms: u64,
}

impl AuditDraft {
    pub fn query_plan_id(&self) -> Option<String> {
        self.query_plan.as_ref().map(|p| p.plan_id.to_string())
    }

    pub fn decision_id(&self) -> Option<String> {
        self.decision.as_ref().map(|d| d.decision_id.to_string())
    }

    pub fn output_id(&self) -> Option<String> {
        self.document.as_ref().map(|d| d.output_id.to_string())
    }
}

/// Persisted audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub entry_id: String,
    pub event_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
    pub correlation_id: String,
    pub actor_id: String,
    pub message: String,
    pub message_length: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_plan: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_id: Option<String>,

    pub policy_mode_version: String,
    pub domain_pack_version: String,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub output_ai: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub routing_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub governing_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesizing_ms: Option<u64>,
    pub total_ms: u64,

    pub checksum: String,
    pub signature: String,
    pub retention_policy: String,
}

impl AuditRecord {
    pub fn summary(&self) -> AuditSummary {
        AuditSummary {
            entry_id: self.entry_id.clone(),
            correlation_id: self.correlation_id.clone(),
            stored_at: self.stored_at,
            status: self.status,
            message_preview: preview(&self.message, AuditSummary::PREVIEW_CHARS),
            total_ms: self.total_ms,
            output_ai: self.output_ai,
        }
    }
}

/// Lightweight view returned by actor history queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub entry_id: String,
    pub correlation_id: String,
    pub stored_at: DateTime<Utc>,
    pub status: AuditStatus,
    pub message_preview: String,
    pub total_ms: u64,
    pub output_ai: bool,
}

impl AuditSummary {
    pub const PREVIEW_CHARS: usize = 80;
}

fn preview(message: &str, max_chars: usize) -> String {
    if message.chars().count() <= max_chars {
        message.to_string()
    } else {
        let mut out: String = message.chars().take(max_chars).collect();
        out.push_str("...");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [AuditStatus::Success, AuditStatus::Error, AuditStatus::Partial] {
            assert_eq!(status.as_str().parse::<AuditStatus>().unwrap(), status);
        }
        assert!("deleted".parse::<AuditStatus>().is_err());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let long = "ñ".repeat(100);
        let p = preview(&long, 10);
        assert_eq!(p.chars().count(), 13);
        assert!(p.ends_with("..."));
        assert_eq!(preview("short", 10), "short");
    }
}
