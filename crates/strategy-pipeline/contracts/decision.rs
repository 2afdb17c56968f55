//! Decision: the Governor's verdict

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConfidenceLevel, Recommendation, RiskDimension, RiskLevel};

/// Level and rationale for one risk dimension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskItem {
    pub level: RiskLevel,
    pub rationale: String,
}

impl RiskItem {
    pub fn new(level: RiskLevel, rationale: impl Into<String>) -> Self {
        Self {
            level,
            rationale: rationale.into(),
        }
    }
}

/// Risk profile over exactly four named dimensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub labor: RiskItem,
    pub tax: RiskItem,
    pub brand: RiskItem,
    pub focus: RiskItem,
}

impl RiskProfile {
    pub fn get(&self, dimension: RiskDimension) -> &RiskItem {
        match dimension {
            RiskDimension::Labor => &self.labor,
            RiskDimension::Tax => &self.tax,
            RiskDimension::Brand => &self.brand,
            RiskDimension::Focus => &self.focus,
        }
    }

    pub fn level(&self, dimension: RiskDimension) -> RiskLevel {
        self.get(dimension).level
    }

    /// Iterate dimensions in rendering order
    pub fn iter(&self) -> impl Iterator<Item = (RiskDimension, &RiskItem)> {
        RiskDimension::ALL.into_iter().map(move |d| (d, self.get(d)))
    }

    /// Dimensions currently at `high`
    pub fn high_dimensions(&self) -> Vec<RiskDimension> {
        self.iter()
            .filter(|(_, item)| item.level == RiskLevel::High)
            .map(|(d, _)| d)
            .collect()
    }
}

/// Exactly three next steps
pub type NextSteps = [String; 3];

/// Structured verdict over a `QueryPlan`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub decision_id: Uuid,

    /// Domain-specific narrative
    pub diagnosis: String,

    pub recommendation: Recommendation,

    pub risk: RiskProfile,

    pub next_steps: NextSteps,

    /// 2-5 unique prohibitions
    pub dont_do: Vec<String>,

    #[serde(default)]
    pub flags: Vec<String>,

    pub confidence: ConfidenceLevel,

    /// Policy-mode version used to produce this decision
    pub policy_mode_version: String,

    /// Copy of the plan's domains, or `["unknown"]`
    pub domains_used: Vec<String>,

    /// Hard constraints violated by the plan
    #[serde(default)]
    pub violations: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// Whether a human must review before acting
    pub fn requires_human_review(&self) -> bool {
        self.flags.iter().any(|f| f == "hitl_required=true")
    }
}
