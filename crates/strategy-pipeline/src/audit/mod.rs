//! Audit sink
//!
//! Turns an `AuditDraft` into a checksummed, signed `AuditRecord` and writes
//! it once to an append-only `AuditStore`.
//!
//! The checksum is SHA-256 over a sorted-key JSON object holding the
//! correlation id, actor id, message, the three stage ids, status and the
//! storage timestamp. The signature is HMAC-SHA256 of that checksum under
//! the configured secret.

pub mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use ring::hmac;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::contracts::{AuditDraft, AuditRecord, AuditSummary};
use crate::error::{AuditError, PipelineError, Result};
use crate::validation;
pub use store::{AuditResult, AuditStore, SqliteAuditStore};

/// Bounds applied to actor history queries
pub const MIN_HISTORY_LIMIT: usize = 1;
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Result of re-checking a stored record's integrity values
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Verification {
    pub checksum_valid: bool,
    pub signature_valid: bool,
}

impl Verification {
    pub fn is_intact(&self) -> bool {
        self.checksum_valid && self.signature_valid
    }
}

pub struct AuditSink {
    store: Arc<dyn AuditStore>,
    key: hmac::Key,
    policy_mode_version: String,
    domain_pack_version: String,
    retention_policy: String,
}

impl AuditSink {
    /// Create a sink writing to `store`. An empty signing secret is rejected.
    pub fn new(config: &PipelineConfig, store: Arc<dyn AuditStore>) -> Result<Self> {
        if config.signing_secret.trim().is_empty() {
            return Err(PipelineError::config("audit signing secret must not be empty"));
        }
        Ok(Self {
            store,
            key: hmac::Key::new(hmac::HMAC_SHA256, config.signing_secret.as_bytes()),
            policy_mode_version: config.policy_mode_version.clone(),
            domain_pack_version: config.domain_pack_version.clone(),
            retention_policy: config.retention_policy.clone(),
        })
    }

    /// Build, sign, validate and insert a record. Returns the entry id.
    pub fn persist(&self, draft: AuditDraft) -> AuditResult<String> {
        let record = self.build_record(draft)?;
        validation::validate_audit_record(&record).map_err(AuditError::Validation)?;
        self.store.insert(&record)?;

        tracing::info!(
            entry_id = %record.entry_id,
            correlation_id = %record.correlation_id,
            status = %record.status,
            "Audit record persisted"
        );
        Ok(record.entry_id)
    }

    pub fn get_by_correlation_id(&self, correlation_id: &str) -> AuditResult<Option<AuditRecord>> {
        self.store.get_by_correlation_id(correlation_id)
    }

    /// Summaries of an actor's records, newest first. `limit` is clamped to
    /// 1..=100.
    pub fn get_recent_by_actor(&self, actor_id: &str, limit: usize) -> AuditResult<Vec<AuditSummary>> {
        let limit = limit.clamp(MIN_HISTORY_LIMIT, MAX_HISTORY_LIMIT);
        Ok(self
            .store
            .recent_by_actor(actor_id, limit)?
            .iter()
            .map(AuditRecord::summary)
            .collect())
    }

    /// Recompute checksum and signature for a stored record
    pub fn verify(&self, record: &AuditRecord) -> Verification {
        let checksum = checksum(record);
        let checksum_valid = checksum == record.checksum;
        let signature_valid = hex::decode(&record.signature)
            .map(|sig| hmac::verify(&self.key, record.checksum.as_bytes(), &sig).is_ok())
            .unwrap_or(false);

        if !(checksum_valid && signature_valid) {
            tracing::warn!(
                entry_id = %record.entry_id,
                checksum_valid = checksum_valid,
                signature_valid = signature_valid,
                "Audit record failed verification"
            );
        }
        Verification {
            checksum_valid,
            signature_valid,
        }
    }

    fn build_record(&self, draft: AuditDraft) -> AuditResult<AuditRecord> {
        let query_plan_id = draft.query_plan_id();
        let decision_id = draft.decision_id();
        let output_id = draft.output_id();
        let output_ai = draft
            .document
            .as_ref()
            .map(|d| d.trace.output_ai.value())
            .unwrap_or(false);

        let mut record = AuditRecord {
            entry_id: Uuid::new_v4().to_string(),
            event_at: draft.event_at,
            stored_at: Utc::now(),
            message_length: draft.message.chars().count() as u64,
            correlation_id: draft.correlation_id,
            actor_id: draft.actor_id,
            message: draft.message,
            query_plan: draft.query_plan.as_ref().map(serde_json::to_value).transpose()?,
            decision: draft.decision.as_ref().map(serde_json::to_value).transpose()?,
            document: draft.document.as_ref().map(serde_json::to_value).transpose()?,
            query_plan_id,
            decision_id,
            output_id,
            policy_mode_version: self.policy_mode_version.clone(),
            domain_pack_version: self.domain_pack_version.clone(),
            status: draft.status,
            error_message: draft.error_message,
            warnings: draft.warnings,
            output_ai,
            routing_ms: draft.routing_ms,
            governing_ms: draft.governing_ms,
            synthesizing_ms: draft.synthesizing_ms,
            total_ms: draft.total_ms,
            checksum: String::new(),
            signature: String::new(),
            retention_policy: self.retention_policy.clone(),
        };

        record.checksum = checksum(&record);
        record.signature = hex::encode(hmac::sign(&self.key, record.checksum.as_bytes()).as_ref());
        Ok(record)
    }
}

impl std::fmt::Debug for AuditSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditSink")
            .field("policy_mode_version", &self.policy_mode_version)
            .field("domain_pack_version", &self.domain_pack_version)
            .field("retention_policy", &self.retention_policy)
            .finish_non_exhaustive()
    }
}

/// SHA-256 over the canonical (sorted-key) JSON of the identifying fields
pub fn checksum(record: &AuditRecord) -> String {
    let optional = |v: &Option<String>| v.clone().map(Value::String).unwrap_or(Value::Null);

    let mut canonical: BTreeMap<&str, Value> = BTreeMap::new();
    canonical.insert("correlation_id", Value::String(record.correlation_id.clone()));
    canonical.insert("actor_id", Value::String(record.actor_id.clone()));
    canonical.insert("message", Value::String(record.message.clone()));
    canonical.insert("query_plan_id", optional(&record.query_plan_id));
    canonical.insert("decision_id", optional(&record.decision_id));
    canonical.insert("output_id", optional(&record.output_id));
    canonical.insert("status", Value::String(record.status.as_str().to_string()));
    canonical.insert(
        "stored_at",
        Value::String(store::format_timestamp(&record.stored_at)),
    );

    // BTreeMap serializes in key order; string values cannot fail
    let payload = serde_json::to_string(&canonical).unwrap_or_default();

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hex::encode(hasher.finalize())
}
