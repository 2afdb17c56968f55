//! QueryPlan: the Router's verdict

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConfidenceLevel, Mode};

/// Status of experimental ("lab") access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabStatus {
    Denied,
}

/// Lab access policy attached to every plan.
///
/// Lab access is permanently denied in this phase; the only way to build a
/// `LabPolicy` is [`LabPolicy::denied`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabPolicy {
    allow_lab: bool,
    status: LabStatus,
}

impl LabPolicy {
    pub const fn denied() -> Self {
        Self {
            allow_lab: false,
            status: LabStatus::Denied,
        }
    }

    pub fn allow_lab(&self) -> bool {
        self.allow_lab
    }

    pub fn status(&self) -> LabStatus {
        self.status
    }

    /// One-line summary used in document plan views
    pub fn summary(&self) -> String {
        if self.allow_lab {
            "lab access granted".to_string()
        } else {
            "lab access denied (phase 1 policy)".to_string()
        }
    }
}

impl Default for LabPolicy {
    fn default() -> Self {
        Self::denied()
    }
}

/// Structured interpretation of a free-text query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Unique plan identifier
    pub plan_id: Uuid,

    /// Correlation id, attached by the Orchestrator after routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Processing depth
    pub mode: Mode,

    /// Caller-provided domain hint ("auto" when none)
    pub domain_hint: String,

    /// Detected domains in detection order, deduplicated, 1-3 entries
    pub domains_selected: Vec<String>,

    /// Agents selected for the plan (may be empty)
    #[serde(default)]
    pub agents_selected: Vec<String>,

    pub needs_evidence: bool,
    pub needs_skills: bool,

    pub lab_policy: LabPolicy,

    /// Deterministic explanation of the routing verdict
    pub rationale: String,

    pub confidence: ConfidenceLevel,

    #[serde(default)]
    pub flags: Vec<String>,

    pub timestamp: DateTime<Utc>,
}

impl QueryPlan {
    /// Default domain hint
    pub const AUTO_HINT: &'static str = "auto";

    /// Return a copy with the correlation id attached
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// First selected domain, if any
    pub fn primary_domain(&self) -> Option<&str> {
        self.domains_selected.first().map(String::as_str)
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.domains_selected.iter().any(|d| d == domain)
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lab_policy_is_denied() {
        let policy = LabPolicy::default();
        assert!(!policy.allow_lab());
        assert_eq!(policy.status(), LabStatus::Denied);

        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json["allow_lab"], false);
        assert_eq!(json["status"], "denied");
    }
}
