//! Strategy Pipeline Contract Definitions
//!
//! This module defines the data contracts exchanged between the stages of
//! the strategic decision pipeline:
//!
//! - `QueryPlan` - the Router's structured interpretation of a query
//! - `Decision` - the Governor's verdict over a `QueryPlan`
//! - `DecisionDocument` - the Synthesizer's five-section rendering
//! - `AuditRecord` - the persisted, signed record of one execution
//!
//! # Design Principles
//!
//! - **Immutable**: each stage returns a fresh value and never mutates its input
//! - **Typed**: fixed cardinalities are encoded in the types where possible
//! - **Traceable**: every value carries its own id and creation timestamp

pub mod audit_record;
pub mod decision;
pub mod document;
pub mod query_plan;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use audit_record::{AuditDraft, AuditRecord, AuditStatus, AuditSummary};
pub use decision::{Decision, NextSteps, RiskItem, RiskProfile};
pub use document::{
    AiGenerated, DecisionDocument, DocumentMeta, DocumentTrace, EvidenceStatus, EvidenceView,
    PlanView, RiskSummary, VersionTriplet,
};
pub use query_plan::{LabPolicy, LabStatus, QueryPlan};

/// Domain keys understood by the Router and the Governor's policy tables
pub mod domains {
    pub const MARKET: &str = "market";
    pub const BRAND: &str = "brand";
    pub const TAX: &str = "tax";
    pub const TRANSITION: &str = "transition";
    pub const SYSTEM: &str = "system";
    pub const GROWTH: &str = "growth";
    pub const UNKNOWN: &str = "unknown";
}

/// Processing depth selected by the Router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fast,
    Deep,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Deep => "deep",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confidence level attached to plans, decisions and documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Governor recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Execute,
    Postpone,
    Reframe,
    Discard,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Execute => "execute",
            Recommendation::Postpone => "postpone",
            Recommendation::Reframe => "reframe",
            Recommendation::Discard => "discard",
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of a single risk dimension
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four risk dimensions assessed for every decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskDimension {
    Labor,
    Tax,
    Brand,
    Focus,
}

impl RiskDimension {
    /// All dimensions in rendering order
    pub const ALL: [RiskDimension; 4] = [
        RiskDimension::Labor,
        RiskDimension::Tax,
        RiskDimension::Brand,
        RiskDimension::Focus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskDimension::Labor => "labor",
            RiskDimension::Tax => "tax",
            RiskDimension::Brand => "brand",
            RiskDimension::Focus => "focus",
        }
    }

    /// Capitalised label used in rendered documents
    pub fn label(&self) -> &'static str {
        match self {
            RiskDimension::Labor => "Labor",
            RiskDimension::Tax => "Tax",
            RiskDimension::Brand => "Brand",
            RiskDimension::Focus => "Focus",
        }
    }
}

impl fmt::Display for RiskDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Mode::Deep).unwrap(), "\"deep\"");
        assert_eq!(
            serde_json::to_string(&Recommendation::Postpone).unwrap(),
            "\"postpone\""
        );
        assert_eq!(serde_json::to_string(&RiskLevel::High).unwrap(), "\"high\"");
        assert_eq!(
            serde_json::to_string(&RiskDimension::Focus).unwrap(),
            "\"focus\""
        );
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(ConfidenceLevel::Low < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::High);
        assert!(RiskLevel::Low < RiskLevel::High);
        assert_eq!(RiskLevel::default(), RiskLevel::Low);
    }
}
