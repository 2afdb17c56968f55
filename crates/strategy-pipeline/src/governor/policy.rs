//! Policy tables for the Governor
//!
//! Everything here is constant for the Governor's lifetime: the guiding
//! principle, weighted priorities, hard constraints and the canned text
//! keyed by domain.

use crate::contracts::{domains, RiskDimension, RiskLevel};

pub const GUIDING_PRINCIPLE: &str =
    "Protect income stability and focus before pursuing growth; sensitive decisions require deep validation.";

/// A weighted priority used to explain decisions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Priority {
    pub name: &'static str,
    pub weight: f64,
}

pub const PRIORITIES: [Priority; 4] = [
    Priority { name: "income-stability", weight: 0.35 },
    Priority { name: "focus", weight: 0.30 },
    Priority { name: "brand-consistency", weight: 0.20 },
    Priority { name: "growth", weight: 0.15 },
];

/// A named, non-negotiable policy rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardConstraint {
    pub id: &'static str,
    pub description: &'static str,
}

pub const HC_BUDGET: HardConstraint = HardConstraint {
    id: "hc_001",
    description: "No financial commitment above the approved budget without explicit review",
};
pub const HC_BRAND: HardConstraint = HardConstraint {
    id: "hc_002",
    description: "No public statement that contradicts the current brand positioning",
};
pub const HC_LAB: HardConstraint = HardConstraint {
    id: "hc_003",
    description: "No experimental (lab) capability may take part in a production decision",
};
pub const HC_TAX_ADVISOR: HardConstraint = HardConstraint {
    id: "hc_004",
    description: "No change to the tax structure without a qualified advisor",
};
pub const HC_EMOTIONAL_LABOR: HardConstraint = HardConstraint {
    id: "hc_005",
    description: "No emotional-labor decision (employment transition) without prior validation",
};

/// Declared constraints. Only hc_003 and hc_005 are evaluated.
pub const HARD_CONSTRAINTS: [HardConstraint; 5] =
    [HC_BUDGET, HC_BRAND, HC_LAB, HC_TAX_ADVISOR, HC_EMOTIONAL_LABOR];

/// Domains that require deep-mode validation to align with the principle
pub const SENSITIVE_DOMAINS: [&str; 2] = [domains::TAX, domains::TRANSITION];

/// Risk levels contributed by a domain; unlisted dimensions are `low`
pub fn domain_risks(domain: &str) -> &'static [(RiskDimension, RiskLevel)] {
    use RiskDimension::*;
    use RiskLevel::*;
    match domain {
        domains::TRANSITION => &[(Labor, High), (Tax, Medium), (Focus, Medium)],
        domains::TAX => &[(Tax, High), (Labor, Medium)],
        domains::GROWTH => &[(Focus, High), (Labor, Medium), (Tax, Medium), (Brand, Medium)],
        domains::BRAND => &[(Brand, Medium), (Focus, Medium)],
        domains::SYSTEM => &[(Focus, Medium)],
        _ => &[],
    }
}

/// Canned rationale for a (domain, dimension) pair at a non-low level
pub fn risk_rationale(domain: &str, dimension: RiskDimension) -> Option<&'static str> {
    use RiskDimension::*;
    let text = match (domain, dimension) {
        (domains::TRANSITION, Labor) => {
            "Leaving or pausing employment removes the stable income that funds every other plan."
        }
        (domains::TRANSITION, Tax) => {
            "A change of employment status changes withholding and may require registering as self-employed."
        }
        (domains::TRANSITION, Focus) => {
            "A career transition absorbs attention that current commitments still need."
        }
        (domains::TAX, Tax) => {
            "Tax structure decisions carry penalties and are hard to reverse once filed."
        }
        (domains::TAX, Labor) => {
            "Tax changes can alter the net income available from current employment."
        }
        (domains::GROWTH, Focus) => "Growth initiatives compete directly with core work for focus.",
        (domains::GROWTH, Labor) => "Growth adds workload on top of existing obligations.",
        (domains::GROWTH, Tax) => "New revenue streams create new tax obligations.",
        (domains::GROWTH, Brand) => "Rapid expansion can dilute a still-forming brand.",
        (domains::BRAND, Brand) => "Public positioning changes are visible and slow to undo.",
        (domains::BRAND, Focus) => "Content production competes with client work for time.",
        (domains::SYSTEM, Focus) => "Tooling changes pause delivery while the new process settles.",
        _ => return None,
    };
    Some(text)
}

/// Rationale for a dimension with no identified risk
pub fn low_risk_rationale(dimension: RiskDimension) -> String {
    format!("No significant {} risk identified for this query.", dimension)
}

/// Three next steps for the primary domain
pub fn next_steps(primary_domain: &str, policy_mode_version: &str) -> [String; 3] {
    let steps: [&str; 3] = match primary_domain {
        domains::TRANSITION => [
            "Calculate at least six months of runway with current fixed expenses.",
            "Validate demand by closing two paying clients before changing employment status.",
            "Review the leave-of-absence terms with HR or a labor advisor in writing.",
        ],
        domains::TAX => [
            "Gather the last two years of filings and current income projections.",
            "Book a session with a qualified tax advisor to compare structures.",
            "Model the net effect of each option before committing to a change.",
        ],
        domains::BRAND => [
            "Write a one-sentence positioning statement and test it with three clients.",
            "Audit existing public profiles for consistency with that statement.",
            "Plan a four-week content calendar before publishing anything new.",
        ],
        _ => {
            return [
                format!(
                    "Define a measurable success criterion under policy {}.",
                    policy_mode_version
                ),
                "Collect the minimum data needed to decide and set a decision date.".to_string(),
                "Execute the smallest reversible step and review the result.".to_string(),
            ]
        }
    };
    steps.map(str::to_string)
}

/// Domain-specific prohibitions (2-3 items)
pub fn domain_prohibitions(domain: &str) -> &'static [&'static str] {
    match domain {
        domains::TRANSITION => &[
            "Do not resign or request leave before validating six months of runway.",
            "Do not announce the transition publicly before it is confirmed.",
            "Do not decide under emotional pressure.",
        ],
        domains::TAX => &[
            "Do not change the tax structure without a qualified advisor.",
            "Do not mix personal and business expenses.",
        ],
        domains::BRAND => &[
            "Do not publish content that contradicts the current positioning.",
            "Do not open new channels before the existing ones are consistent.",
        ],
        domains::MARKET => &[
            "Do not commit capital based on a single price reference.",
            "Do not skip the comparable-sales check.",
        ],
        domains::SYSTEM => &[
            "Do not automate a process that is not yet stable.",
            "Do not add a tool without retiring an existing one.",
        ],
        _ => &[
            "Do not act without a defined success metric.",
            "Do not expand the scope mid-execution.",
        ],
    }
}

pub const LABOR_RISK_PROHIBITION: &str =
    "Do not take on additional workload until the labor risk is resolved.";
pub const FOCUS_RISK_PROHIBITION: &str = "Do not open new fronts while focus risk is high.";
pub const NO_OVERCOMPLICATION: &str = "Do not overcomplicate the solution.";
pub const PADDING_PROHIBITION: &str = "Do not proceed without reviewing this decision.";

/// Domain-specific diagnosis narrative
pub fn diagnosis(primary_domain: &str, recommendation: &str) -> String {
    match primary_domain {
        domains::TRANSITION => format!(
            "This is an employment-transition decision with high labor exposure. Income stability \
             is at stake and the decision carries emotional weight, so it must be validated \
             before acting. Recommended course: {}.",
            recommendation
        ),
        domains::TAX => format!(
            "This is a tax-structure decision. Mistakes are costly and hard to reverse, and the \
             right answer depends on figures that must be verified with an advisor. \
             Recommended course: {}.",
            recommendation
        ),
        other => format!(
            "The query falls within the {} domain. Based on the current policy and risk \
             profile, the recommended course is to {}.",
            other, recommendation
        ),
    }
}
