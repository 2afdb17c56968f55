//! Document composition
//!
//! A `Composer` renders a `Decision` into a `DecisionDocument`. The
//! Synthesizer retries the composer and falls back to a degraded document
//! when it keeps failing.

use chrono::Utc;
use uuid::Uuid;

use crate::contracts::{
    Decision, DecisionDocument, DocumentMeta, DocumentTrace, EvidenceView, PlanView, QueryPlan,
    Recommendation, RiskSummary, VersionTriplet,
};
use crate::error::Result;
use crate::validation::section_marker;

/// Renders a decision into a document
pub trait Composer: Send + Sync {
    /// Composer name, for logs
    fn name(&self) -> &str;

    fn compose(
        &self,
        plan: &QueryPlan,
        decision: &Decision,
        versions: &VersionTriplet,
    ) -> Result<DecisionDocument>;
}

/// Rule-based five-section composer
#[derive(Debug, Clone, Default)]
pub struct StandardComposer;

impl StandardComposer {
    pub fn new() -> Self {
        Self
    }
}

impl Composer for StandardComposer {
    fn name(&self) -> &str {
        "standard"
    }

    fn compose(
        &self,
        plan: &QueryPlan,
        decision: &Decision,
        versions: &VersionTriplet,
    ) -> Result<DecisionDocument> {
        Ok(DecisionDocument {
            output_id: Uuid::new_v4(),
            answer: render_answer(decision),
            meta: DocumentMeta {
                mode: plan.mode,
                domain_hint: plan.domain_hint.clone(),
                confidence: decision.confidence,
                flags: merge_flags(&plan.flags, &decision.flags),
                recommendation: decision.recommendation,
                risk_summary: risk_summary(decision),
                versions: versions.clone(),
            },
            plan: plan_view(plan),
            trace: trace(plan, decision),
            evidence: EvidenceView::not_available(),
        })
    }
}

/// User-facing phrase for a recommendation
pub fn recommendation_label(recommendation: Recommendation) -> &'static str {
    match recommendation {
        Recommendation::Execute => "Proceed",
        Recommendation::Postpone => "Postpone",
        Recommendation::Reframe => "Reframe the question",
        Recommendation::Discard => "Discard",
    }
}

/// One-sentence justification for a recommendation
pub fn recommendation_justification(recommendation: Recommendation) -> &'static str {
    match recommendation {
        Recommendation::Execute => {
            "The risk profile is acceptable and no hard constraint is violated."
        }
        Recommendation::Postpone => {
            "Conditions to act safely are not met yet; revisit once the risks below are addressed."
        }
        Recommendation::Reframe => {
            "The question touches a sensitive area and needs a deeper, more specific formulation."
        }
        Recommendation::Discard => "The option does not fit the current priorities.",
    }
}

pub(crate) fn render_answer(decision: &Decision) -> String {
    let mut out = String::new();

    push_section(&mut out, "Diagnosis");
    out.push_str(&decision.diagnosis);
    out.push_str("\n\n");

    push_section(&mut out, "Recommendation");
    out.push_str(&format!(
        "**{}**. {}\n\n",
        recommendation_label(decision.recommendation),
        recommendation_justification(decision.recommendation)
    ));

    push_section(&mut out, "Risks");
    for (dimension, item) in decision.risk.iter() {
        out.push_str(&format!(
            "- **{}**: {}. {}\n",
            dimension.label(),
            item.level.as_str().to_uppercase(),
            item.rationale
        ));
    }
    out.push('\n');

    push_section(&mut out, "Next Steps");
    for step in &decision.next_steps {
        out.push_str(&format!("- {}\n", step));
    }
    out.push('\n');

    push_section(&mut out, "Prohibitions");
    for item in &decision.dont_do {
        out.push_str(&format!("- {}\n", item));
    }

    out
}

pub(crate) fn push_section(out: &mut String, name: &str) {
    out.push_str(&section_marker(name));
    out.push_str("\n\n");
}

/// Plan flags followed by decision flags, without duplicates
pub(crate) fn merge_flags(plan_flags: &[String], decision_flags: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(plan_flags.len() + decision_flags.len());
    for flag in plan_flags.iter().chain(decision_flags) {
        if !merged.contains(flag) {
            merged.push(flag.clone());
        }
    }
    merged
}

pub(crate) fn risk_summary(decision: &Decision) -> RiskSummary {
    RiskSummary {
        labor: decision.risk.labor.level,
        tax: decision.risk.tax.level,
        brand: decision.risk.brand.level,
        focus: decision.risk.focus.level,
    }
}

pub(crate) fn plan_view(plan: &QueryPlan) -> PlanView {
    PlanView {
        domains_selected: plan.domains_selected.clone(),
        rationale: plan.rationale.clone(),
        lab_policy: plan.lab_policy.summary(),
    }
}

pub(crate) fn trace(plan: &QueryPlan, decision: &Decision) -> DocumentTrace {
    DocumentTrace {
        trace_id: Uuid::new_v4(),
        query_plan_id: plan.plan_id,
        decision_id: decision.decision_id,
        created_at: Utc::now(),
        output_ai: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::document::ANSWER_SECTIONS;
    use crate::governor::Governor;
    use crate::router::Router;

    fn versions() -> VersionTriplet {
        VersionTriplet {
            schema_version: "1.0.0".to_string(),
            policy_mode: "policy-mode-test".to_string(),
            domain_pack: "pack-test".to_string(),
        }
    }

    #[test]
    fn test_answer_has_sections_in_order() {
        let plan = Router::new()
            .route("¿Es buen momento para solicitar excedencia en CGI?")
            .unwrap();
        let decision = Governor::new("policy-mode-test").evaluate(&plan).unwrap();
        let answer = render_answer(&decision);

        let positions: Vec<usize> = ANSWER_SECTIONS
            .iter()
            .map(|s| answer.find(&section_marker(s)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(answer.contains("**Postpone**"));
        assert!(answer.contains("- **Labor**: HIGH."));
    }

    #[test]
    fn test_compose_carries_plan_and_decision() {
        let plan = Router::new().route("Activa el modo lab para el CRM").unwrap();
        let decision = Governor::new("policy-mode-test").evaluate(&plan).unwrap();
        let doc = StandardComposer::new()
            .compose(&plan, &decision, &versions())
            .unwrap();

        assert_eq!(doc.trace.query_plan_id, plan.plan_id);
        assert_eq!(doc.trace.decision_id, decision.decision_id);
        assert_eq!(doc.meta.recommendation, decision.recommendation);
        assert_eq!(doc.meta.versions.domain_pack, "pack-test");
        assert_eq!(doc.plan.lab_policy, plan.lab_policy.summary());
        assert!(doc.meta.flags.contains(&"lab-access-denied".to_string()));
        assert!(doc.meta.flags.contains(&"hitl_required=true".to_string()));
    }

    #[test]
    fn test_merge_flags_dedups_in_order() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["y".to_string(), "z".to_string()];
        assert_eq!(merge_flags(&a, &b), vec!["x", "y", "z"]);
    }
}
