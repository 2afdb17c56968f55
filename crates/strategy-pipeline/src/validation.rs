//! Contract validation
//!
//! Pure predicates, one per contract type. Each stage calls its validator
//! immediately before returning; values are never revalidated afterwards.

use std::collections::HashSet;

use crate::contracts::document::ANSWER_SECTIONS;
use crate::contracts::{
    AuditRecord, AuditStatus, ConfidenceLevel, Decision, DecisionDocument, EvidenceStatus, Mode,
    QueryPlan,
};
use crate::error::ValidationFailure;

/// Bounds on `QueryPlan::domains_selected`
pub const MIN_DOMAINS: usize = 1;
pub const MAX_DOMAINS: usize = 3;
pub const MAX_FAST_DOMAINS: usize = 2;

/// Bounds on `Decision::dont_do`
pub const MIN_DONT_DO: usize = 2;
pub const MAX_DONT_DO: usize = 5;

pub type ContractResult = std::result::Result<(), ValidationFailure>;

/// Markdown header that introduces a section of the answer
pub fn section_marker(name: &str) -> String {
    format!("## {}", name)
}

pub fn validate_query_plan(plan: &QueryPlan) -> ContractResult {
    let fail = |reason: String| Err(ValidationFailure::new("QueryPlan", reason));
    let count = plan.domains_selected.len();

    if !(MIN_DOMAINS..=MAX_DOMAINS).contains(&count) {
        return fail(format!(
            "domains_selected must have {}-{} entries, got {}",
            MIN_DOMAINS, MAX_DOMAINS, count
        ));
    }
    if plan.mode == Mode::Fast && count > MAX_FAST_DOMAINS {
        return fail(format!(
            "fast mode allows at most {} domains, got {}",
            MAX_FAST_DOMAINS, count
        ));
    }
    if plan.domains_selected.iter().any(|d| d.trim().is_empty()) {
        return fail("domains_selected contains an empty domain".to_string());
    }
    if let Some(dup) = first_duplicate(&plan.domains_selected) {
        return fail(format!("domains_selected contains duplicate '{}'", dup));
    }
    if plan.domain_hint.trim().is_empty() {
        return fail("domain_hint must not be empty".to_string());
    }
    if plan.rationale.trim().is_empty() {
        return fail("rationale must not be empty".to_string());
    }
    if plan.lab_policy.allow_lab() {
        return fail("lab access must be denied".to_string());
    }
    Ok(())
}

pub fn validate_decision(decision: &Decision) -> ContractResult {
    let fail = |reason: String| Err(ValidationFailure::new("Decision", reason));

    if decision.diagnosis.trim().is_empty() {
        return fail("diagnosis must not be empty".to_string());
    }
    if let Some(i) = decision.next_steps.iter().position(|s| s.trim().is_empty()) {
        return fail(format!("next_steps[{}] is empty", i));
    }
    let count = decision.dont_do.len();
    if !(MIN_DONT_DO..=MAX_DONT_DO).contains(&count) {
        return fail(format!(
            "dont_do must have {}-{} entries, got {}",
            MIN_DONT_DO, MAX_DONT_DO, count
        ));
    }
    if decision.dont_do.iter().any(|s| s.trim().is_empty()) {
        return fail("dont_do contains an empty entry".to_string());
    }
    if let Some(dup) = first_duplicate(&decision.dont_do) {
        return fail(format!("dont_do contains duplicate '{}'", dup));
    }
    if decision.domains_used.is_empty() {
        return fail("domains_used must not be empty".to_string());
    }
    if decision.policy_mode_version.trim().is_empty() {
        return fail("policy_mode_version must not be empty".to_string());
    }
    Ok(())
}

pub fn validate_document(document: &DecisionDocument) -> ContractResult {
    let fail = |reason: String| Err(ValidationFailure::new("DecisionDocument", reason));

    let mut cursor = 0;
    for name in ANSWER_SECTIONS {
        let marker = section_marker(name);
        match document.answer[cursor..].find(&marker) {
            Some(offset) => cursor += offset + marker.len(),
            None => {
                return fail(format!("answer is missing section '{}' (or it is out of order)", name))
            }
        }
    }
    if document.evidence.status != EvidenceStatus::NotAvailable
        || !document.evidence.items.is_empty()
    {
        return fail("evidence must be not_available with no items".to_string());
    }
    if document.plan.domains_selected.is_empty() {
        return fail("plan view has no domains".to_string());
    }
    if document.is_degraded() && document.meta.confidence != ConfidenceLevel::Low {
        return fail("degraded documents must have low confidence".to_string());
    }
    let versions = &document.meta.versions;
    if versions.schema_version.is_empty()
        || versions.policy_mode.is_empty()
        || versions.domain_pack.is_empty()
    {
        return fail("version triplet must be complete".to_string());
    }
    Ok(())
}

pub fn validate_audit_record(record: &AuditRecord) -> ContractResult {
    let fail = |reason: String| Err(ValidationFailure::new("AuditRecord", reason));

    if record.correlation_id.trim().is_empty() {
        return fail("correlation_id must not be empty".to_string());
    }
    if record.actor_id.trim().is_empty() {
        return fail("actor_id must not be empty".to_string());
    }
    if record.message_length != record.message.chars().count() as u64 {
        return fail("message_length does not match message".to_string());
    }
    let snapshots = [
        ("query_plan", record.query_plan.is_some(), record.query_plan_id.is_some()),
        ("decision", record.decision.is_some(), record.decision_id.is_some()),
        ("document", record.document.is_some(), record.output_id.is_some()),
    ];
    for (name, has_snapshot, has_id) in snapshots {
        if has_snapshot != has_id {
            return fail(format!("{} snapshot and id must be present together", name));
        }
        if record.status == AuditStatus::Success && !has_snapshot {
            return fail(format!("successful records require a {} snapshot", name));
        }
    }
    if record.status == AuditStatus::Success && !record.output_ai {
        return fail("output_ai must be true for successful records".to_string());
    }
    if record.output_ai && record.document.is_none() {
        return fail("output_ai requires a document snapshot".to_string());
    }
    if record.status != AuditStatus::Success && record.error_message.is_none() {
        return fail(format!("{} records require an error message", record.status));
    }
    if record.checksum.is_empty() || record.signature.is_empty() {
        return fail("checksum and signature are required".to_string());
    }
    Ok(())
}

fn first_duplicate(items: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    items
        .iter()
        .find(|item| !seen.insert(item.as_str()))
        .map(String::as_str)
}
