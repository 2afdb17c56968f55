//! DecisionDocument: the Synthesizer's user-facing artifact

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::{ConfidenceLevel, Mode, Recommendation, RiskLevel};

/// Section headers every answer must contain, in order
pub const ANSWER_SECTIONS: [&str; 5] = [
    "Diagnosis",
    "Recommendation",
    "Risks",
    "Next Steps",
    "Prohibitions",
];

/// Marker that the document was produced by the automated pipeline.
///
/// Serializes as `true`; deserializing `false` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AiGenerated;

impl AiGenerated {
    pub fn value(&self) -> bool {
        true
    }
}

impl Serialize for AiGenerated {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bool(true)
    }
}

impl<'de> Deserialize<'de> for AiGenerated {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if bool::deserialize(deserializer)? {
            Ok(AiGenerated)
        } else {
            Err(de::Error::custom("output_ai must be true"))
        }
    }
}

/// Risk levels per dimension, without rationales
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub labor: RiskLevel,
    pub tax: RiskLevel,
    pub brand: RiskLevel,
    pub focus: RiskLevel,
}

/// Schema version / policy-mode id / domain-pack id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionTriplet {
    pub schema_version: String,
    pub policy_mode: String,
    pub domain_pack: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub mode: Mode,
    pub domain_hint: String,
    pub confidence: ConfidenceLevel,
    pub flags: Vec<String>,
    pub recommendation: Recommendation,
    pub risk_summary: RiskSummary,
    pub versions: VersionTriplet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanView {
    pub domains_selected: Vec<String>,
    pub rationale: String,
    pub lab_policy: String,
}

/// Provenance of the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTrace {
    pub trace_id: Uuid,
    pub query_plan_id: Uuid,
    pub decision_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub output_ai: AiGenerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceStatus {
    NotAvailable,
}

/// Evidence attached to the document. Retrieval is disabled, so this is
/// always `not_available` with no items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceView {
    pub status: EvidenceStatus,
    pub items: Vec<serde_json::Value>,
}

impl EvidenceView {
    pub fn not_available() -> Self {
        Self {
            status: EvidenceStatus::NotAvailable,
            items: Vec::new(),
        }
    }
}

/// Five-section rendering of a Decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionDocument {
    pub output_id: Uuid,
    pub answer: String,
    pub meta: DocumentMeta,
    pub plan: PlanView,
    pub trace: DocumentTrace,
    pub evidence: EvidenceView,
}

impl DecisionDocument {
    pub const DEGRADED_FLAG: &'static str = "degraded-output";
    pub const RECOVERY_FLAG: &'static str = "error-recovery";

    /// Whether this is the degraded fallback variant
    pub fn is_degraded(&self) -> bool {
        self.meta.flags.iter().any(|f| f == Self::DEGRADED_FLAG)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ai_marker_serializes_true() {
        assert_eq!(serde_json::to_string(&AiGenerated).unwrap(), "true");
        assert!(serde_json::from_str::<AiGenerated>("true").is_ok());
    }

    #[test]
    fn test_ai_marker_rejects_false() {
        let err = serde_json::from_str::<AiGenerated>("false").unwrap_err();
        assert!(err.to_string().contains("output_ai must be true"));
    }

    #[test]
    fn test_evidence_not_available() {
        let evidence = EvidenceView::not_available();
        let json = serde_json::to_value(&evidence).unwrap();
        assert_eq!(json["status"], "not_available");
        assert_eq!(json["items"], serde_json::json!([]));
    }
}
