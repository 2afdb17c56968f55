//! Governor policy engine
//!
//! Maps a validated `QueryPlan` to a `Decision`. Evaluation is strictly
//! ordered: principle alignment, risk assessment, hard constraints,
//! recommendation, next steps, prohibitions, flags, confidence and
//! diagnosis. No I/O; the result depends only on the plan and the fixed
//! policy tables.

pub mod policy;

use chrono::Utc;
use uuid::Uuid;

use crate::contracts::{
    domains, ConfidenceLevel, Decision, Mode, QueryPlan, Recommendation, RiskDimension, RiskItem,
    RiskLevel, RiskProfile,
};
use crate::error::{codes, contain_panic, PipelineError, Result};
use crate::validation::{self, MAX_DONT_DO, MIN_DONT_DO};
use policy::{HardConstraint, Priority, HC_EMOTIONAL_LABOR, HC_LAB};

/// Flag set when a human must review the decision
pub const HITL_FLAG: &str = "hitl_required=true";

/// Rule-based policy engine
#[derive(Debug, Clone)]
pub struct Governor {
    principle: &'static str,
    priorities: [Priority; 4],
    hard_constraints: [HardConstraint; 5],
    policy_mode_version: String,
}

impl Governor {
    pub fn new(policy_mode_version: impl Into<String>) -> Self {
        Self {
            principle: policy::GUIDING_PRINCIPLE,
            priorities: policy::PRIORITIES,
            hard_constraints: policy::HARD_CONSTRAINTS,
            policy_mode_version: policy_mode_version.into(),
        }
    }

    pub fn principle(&self) -> &str {
        self.principle
    }

    pub fn priorities(&self) -> &[Priority] {
        &self.priorities
    }

    pub fn hard_constraints(&self) -> &[HardConstraint] {
        &self.hard_constraints
    }

    pub fn policy_mode_version(&self) -> &str {
        &self.policy_mode_version
    }

    /// Evaluate a plan and produce a validated decision. The plan is taken
    /// as validated by the Router; a panic while evaluating is reported as a
    /// `Governor` error.
    pub fn evaluate(&self, plan: &QueryPlan) -> Result<Decision> {
        contain_panic(PipelineError::Governor, || self.decide_plan(plan))
    }

    fn decide_plan(&self, plan: &QueryPlan) -> Result<Decision> {
        let aligned = self.aligned_with_principle(plan);
        let risk = self.assess_risk(plan);
        let violations = self.check_hard_constraints(plan);
        let recommendation = decide(&risk, &violations, aligned, plan.confidence);

        let primary = plan.primary_domain().unwrap_or(domains::UNKNOWN);
        let next_steps = policy::next_steps(primary, &self.policy_mode_version);
        let dont_do = build_prohibitions(primary, &risk);

        let mut decision_flags = Vec::new();
        if !violations.is_empty() {
            decision_flags.push(HITL_FLAG.to_string());
        }
        for dimension in risk.high_dimensions() {
            decision_flags.push(format!("{}-risk=HIGH", dimension));
        }

        let confidence = recompute_confidence(plan.confidence, !violations.is_empty());

        let domains_used = if plan.domains_selected.is_empty() {
            vec![domains::UNKNOWN.to_string()]
        } else {
            plan.domains_selected.clone()
        };

        let decision = Decision {
            decision_id: Uuid::new_v4(),
            diagnosis: policy::diagnosis(primary, recommendation.as_str()),
            recommendation,
            risk,
            next_steps,
            dont_do,
            flags: decision_flags,
            confidence,
            policy_mode_version: self.policy_mode_version.clone(),
            domains_used,
            violations: violations.iter().map(|c| c.id.to_string()).collect(),
            timestamp: Utc::now(),
        };

        validation::validate_decision(&decision)
            .map_err(|f| PipelineError::validation(codes::GOVERNOR_VALIDATION_FAILED, f))?;

        tracing::debug!(
            decision_id = %decision.decision_id,
            correlation_id = plan.correlation_id.as_deref().unwrap_or("-"),
            recommendation = %decision.recommendation,
            violations = ?decision.violations,
            "Governor decision"
        );

        Ok(decision)
    }

    /// Sensitive domains are only aligned when evaluated in deep mode
    fn aligned_with_principle(&self, plan: &QueryPlan) -> bool {
        let sensitive = policy::SENSITIVE_DOMAINS
            .iter()
            .any(|d| plan.has_domain(d));
        !(sensitive && plan.mode != Mode::Deep)
    }

    /// Highest level per dimension across the plan's domains. The rationale
    /// comes from the first domain that reached that level.
    fn assess_risk(&self, plan: &QueryPlan) -> RiskProfile {
        let item = |dimension: RiskDimension| {
            let mut best: Option<(RiskLevel, &str)> = None;
            for domain in &plan.domains_selected {
                let level = policy::domain_risks(domain)
                    .iter()
                    .find(|(d, _)| *d == dimension)
                    .map(|(_, l)| *l)
                    .unwrap_or(RiskLevel::Low);
                if level > RiskLevel::Low && best.map_or(true, |(b, _)| level > b) {
                    best = Some((level, domain.as_str()));
                }
            }
            match best {
                Some((level, domain)) => RiskItem::new(
                    level,
                    policy::risk_rationale(domain, dimension)
                        .map(str::to_string)
                        .unwrap_or_else(|| policy::low_risk_rationale(dimension)),
                ),
                None => RiskItem::new(RiskLevel::Low, policy::low_risk_rationale(dimension)),
            }
        };

        RiskProfile {
            labor: item(RiskDimension::Labor),
            tax: item(RiskDimension::Tax),
            brand: item(RiskDimension::Brand),
            focus: item(RiskDimension::Focus),
        }
    }

    /// Only hc_003 and hc_005 have evaluation logic; the others are declared
    /// but inert.
    fn check_hard_constraints(&self, plan: &QueryPlan) -> Vec<HardConstraint> {
        let mut violated = Vec::new();
        if plan.has_domain(domains::TRANSITION) {
            violated.push(HC_EMOTIONAL_LABOR);
        }
        if plan.flags.iter().any(|f| is_lab_flag(f)) {
            violated.push(HC_LAB);
        }
        violated
    }
}

impl Default for Governor {
    fn default() -> Self {
        Self::new(crate::config::PipelineConfig::default().policy_mode_version)
    }
}

/// A flag is a lab flag when one of its hyphen/underscore separated parts is
/// "lab", case-insensitively.
fn is_lab_flag(flag: &str) -> bool {
    flag.split(|c: char| c == '-' || c == '_' || c == '=')
        .any(|part| part.eq_ignore_ascii_case("lab"))
}

/// Recommendation table, evaluated in priority order
fn decide(
    risk: &RiskProfile,
    violations: &[HardConstraint],
    aligned: bool,
    plan_confidence: ConfidenceLevel,
) -> Recommendation {
    let severe = risk.labor.level == RiskLevel::High || risk.tax.level == RiskLevel::High;
    if severe && !violations.is_empty() {
        Recommendation::Postpone
    } else if !aligned {
        Recommendation::Reframe
    } else if plan_confidence == ConfidenceLevel::Low {
        Recommendation::Postpone
    } else {
        Recommendation::Execute
    }
}

/// Domain list, risk-triggered items, the generic item; deduplicated and
/// clamped to 2-5 entries.
fn build_prohibitions(primary_domain: &str, risk: &RiskProfile) -> Vec<String> {
    let mut candidates: Vec<&str> = policy::domain_prohibitions(primary_domain).to_vec();
    if risk.labor.level == RiskLevel::High {
        candidates.push(policy::LABOR_RISK_PROHIBITION);
    }
    if risk.focus.level == RiskLevel::High {
        candidates.push(policy::FOCUS_RISK_PROHIBITION);
    }
    candidates.push(policy::NO_OVERCOMPLICATION);

    let mut out: Vec<String> = Vec::with_capacity(MAX_DONT_DO);
    for item in candidates {
        if !out.iter().any(|existing| existing == item) {
            out.push(item.to_string());
        }
    }
    out.truncate(MAX_DONT_DO);
    while out.len() < MIN_DONT_DO {
        out.push(policy::PADDING_PROHIBITION.to_string());
    }
    out
}

/// Violations cap confidence at `medium` without ever raising it; a `low`
/// plan without violations is settled at `medium`.
fn recompute_confidence(plan: ConfidenceLevel, has_violations: bool) -> ConfidenceLevel {
    if has_violations {
        plan.min(ConfidenceLevel::Medium)
    } else if plan == ConfidenceLevel::Low {
        ConfidenceLevel::Medium
    } else {
        plan
    }
}
