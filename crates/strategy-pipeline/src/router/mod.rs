//! Query router
//!
//! Maps a free-text message to a `QueryPlan`. Routing is rule-based and
//! deterministic: the same message always yields the same domains, mode,
//! confidence and flags.

pub mod keywords;

use chrono::Utc;
use uuid::Uuid;

use crate::contracts::{domains, ConfidenceLevel, LabPolicy, Mode, QueryPlan};
use crate::error::{codes, contain_panic, PipelineError, Result};
use crate::validation::{self, MAX_DOMAINS};
use keywords::{
    matches_exact, matches_prefix, tokenize, COMPLEXITY_PHRASES, COMPLEXITY_WORDS,
    DOMAIN_KEYWORDS, LAB_WORDS,
};

/// Messages shorter than this may be routed in fast mode
pub const FAST_MODE_MAX_WORDS: usize = 15;

/// Messages longer than this count towards high confidence
pub const HIGH_CONFIDENCE_MIN_WORDS: usize = 10;

/// Messages shorter than this are flagged for clarification
pub const CLARIFICATION_MAX_WORDS: usize = 8;

pub mod flags {
    pub const NEEDS_CLARIFICATION: &str = "needs-clarification";
    pub const LAB_ACCESS_REQUESTED: &str = "lab-access-requested";
    pub const LAB_ACCESS_DENIED: &str = "lab-access-denied";
    pub const ROUTER_AMBIGUITY: &str = "router-ambiguity-detected";
}

/// Rule-based query router
#[derive(Debug, Clone, Default)]
pub struct Router;

impl Router {
    pub fn new() -> Self {
        Self
    }

    /// Route a message with the default `"auto"` domain hint
    pub fn route(&self, message: &str) -> Result<QueryPlan> {
        self.route_with_hint(message, None)
    }

    /// Route a message, recording the caller's domain hint on the plan.
    /// A panic while routing is reported as a `Router` error.
    pub fn route_with_hint(&self, message: &str, domain_hint: Option<&str>) -> Result<QueryPlan> {
        contain_panic(PipelineError::Router, || self.build_plan(message, domain_hint))
    }

    fn build_plan(&self, message: &str, domain_hint: Option<&str>) -> Result<QueryPlan> {
        let tokens = tokenize(message);
        let word_count = message.split_whitespace().count();
        let is_question = message.trim_end().ends_with('?');

        let detected = detect_domains(&tokens);
        let domains_selected: Vec<String> = if detected.is_empty() {
            vec![domains::MARKET.to_string()]
        } else {
            detected
                .iter()
                .take(MAX_DOMAINS)
                .map(|d| d.to_string())
                .collect()
        };

        let mode = select_mode(message, &tokens, word_count, domains_selected.len());
        let confidence = score_confidence(word_count, domains_selected.len(), is_question);

        let mut plan_flags = Vec::new();
        if word_count < CLARIFICATION_MAX_WORDS {
            plan_flags.push(flags::NEEDS_CLARIFICATION.to_string());
        }
        if matches_exact(&tokens, LAB_WORDS) {
            plan_flags.push(flags::LAB_ACCESS_REQUESTED.to_string());
            plan_flags.push(flags::LAB_ACCESS_DENIED.to_string());
        }
        if detected.len() > 2 {
            plan_flags.push(flags::ROUTER_AMBIGUITY.to_string());
        }

        let plan = QueryPlan {
            plan_id: Uuid::new_v4(),
            correlation_id: None,
            mode,
            domain_hint: domain_hint
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(QueryPlan::AUTO_HINT)
                .to_string(),
            rationale: build_rationale(&domains_selected, confidence),
            domains_selected,
            agents_selected: Vec::new(),
            needs_evidence: mode == Mode::Deep,
            needs_skills: false,
            lab_policy: LabPolicy::denied(),
            confidence,
            flags: plan_flags,
            timestamp: Utc::now(),
        };

        validation::validate_query_plan(&plan)
            .map_err(|f| PipelineError::validation(codes::ROUTER_VALIDATION_FAILED, f))?;

        tracing::debug!(
            plan_id = %plan.plan_id,
            mode = %plan.mode,
            confidence = %plan.confidence,
            domains = ?plan.domains_selected,
            "Routed query"
        );

        Ok(plan)
    }
}

/// Domains whose keywords appear in the message, in table order
fn detect_domains(tokens: &[String]) -> Vec<&'static str> {
    DOMAIN_KEYWORDS
        .iter()
        .filter(|(_, keywords)| matches_prefix(tokens, keywords))
        .map(|(domain, _)| *domain)
        .collect()
}

fn select_mode(message: &str, tokens: &[String], word_count: usize, domain_count: usize) -> Mode {
    let lowered = message.to_lowercase();
    let complex = matches_exact(tokens, COMPLEXITY_WORDS)
        || COMPLEXITY_PHRASES.iter().any(|p| lowered.contains(p));

    if word_count < FAST_MODE_MAX_WORDS && domain_count == 1 && !complex {
        Mode::Fast
    } else {
        Mode::Deep
    }
}

fn score_confidence(word_count: usize, domain_count: usize, is_question: bool) -> ConfidenceLevel {
    let detailed = word_count > HIGH_CONFIDENCE_MIN_WORDS;
    let focused = domain_count == 1 && is_question;

    match (detailed, focused) {
        (true, true) => ConfidenceLevel::High,
        (true, false) | (false, true) => ConfidenceLevel::Medium,
        (false, false) => ConfidenceLevel::Low,
    }
}

fn build_rationale(domains_selected: &[String], confidence: ConfidenceLevel) -> String {
    format!(
        "Query routed to {} domain(s): {}. Routing confidence: {}.",
        domains_selected.len(),
        domains_selected.join(", "),
        confidence
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leave_of_absence_routes_to_transition() {
        let plan = Router::new()
            .route("¿Es buen momento para solicitar excedencia en CGI?")
            .unwrap();

        assert_eq!(plan.domains_selected, vec!["transition"]);
        assert_eq!(plan.mode, Mode::Fast);
        assert_eq!(plan.confidence, ConfidenceLevel::Medium);
        assert!(!plan.has_flag(flags::NEEDS_CLARIFICATION));
    }

    #[test]
    fn test_market_price_question() {
        let plan = Router::new()
            .route("¿Cuál es el precio de mercado para una villa en Andratx?")
            .unwrap();

        assert_eq!(plan.domains_selected, vec!["market"]);
        assert_eq!(plan.mode, Mode::Fast);
        assert_eq!(plan.confidence, ConfidenceLevel::High);
        assert!(plan.flags.is_empty());
    }

    #[test]
    fn test_empty_message_defaults_to_market() {
        let plan = Router::new().route("").unwrap();

        assert_eq!(plan.domains_selected, vec!["market"]);
        assert_eq!(plan.confidence, ConfidenceLevel::Low);
        assert!(plan.has_flag(flags::NEEDS_CLARIFICATION));
        assert_eq!(plan.domain_hint, "auto");
    }

    #[test]
    fn test_many_domains_truncated_and_flagged() {
        let plan = Router::new()
            .route("Quiero vender la villa, mejorar mi marca, pagar menos impuestos y automatizar el CRM")
            .unwrap();

        assert_eq!(plan.domains_selected, vec!["market", "brand", "tax"]);
        assert_eq!(plan.mode, Mode::Deep);
        assert!(plan.has_flag(flags::ROUTER_AMBIGUITY));
    }

    #[test]
    fn test_complexity_forces_deep_mode() {
        let plan = Router::new()
            .route("Comparar alquiler frente a venta")
            .unwrap();
        assert_eq!(plan.mode, Mode::Deep);
        assert!(plan.needs_evidence);
    }

    #[test]
    fn test_lab_request_flags_pair() {
        let plan = Router::new().route("Activa el modo lab para el CRM").unwrap();
        assert!(plan.has_flag(flags::LAB_ACCESS_REQUESTED));
        assert!(plan.has_flag(flags::LAB_ACCESS_DENIED));
        assert!(!plan.lab_policy.allow_lab());
    }

    #[test]
    fn test_domain_hint_recorded() {
        let plan = Router::new()
            .route_with_hint("precio de la villa", Some("market"))
            .unwrap();
        assert_eq!(plan.domain_hint, "market");
    }

    #[test]
    fn test_confidence_matrix() {
        assert_eq!(score_confidence(12, 1, true), ConfidenceLevel::High);
        assert_eq!(score_confidence(12, 2, true), ConfidenceLevel::Medium);
        assert_eq!(score_confidence(5, 1, true), ConfidenceLevel::Medium);
        assert_eq!(score_confidence(5, 1, false), ConfidenceLevel::Low);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let router = Router::new();
        let message = "Necesito una estrategia fiscal para mi sociedad";
        let a = router.route(message).unwrap();
        let b = router.route(message).unwrap();

        assert_eq!(a.domains_selected, b.domains_selected);
        assert_eq!(a.mode, b.mode);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.flags, b.flags);
        assert_eq!(a.rationale, b.rationale);
    }
}
