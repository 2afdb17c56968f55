//! Property tests for the pipeline stages

use std::collections::HashSet;

use proptest::prelude::*;
use strategy_pipeline::contracts::document::ANSWER_SECTIONS;
use strategy_pipeline::contracts::{Mode, VersionTriplet};
use strategy_pipeline::validation::{self, section_marker};
use strategy_pipeline::{Composer, Governor, Router, StandardComposer};

const VOCABULARY: &[&str] = &[
    "precio", "mercado", "villa", "marca", "contenido", "impuestos", "fiscal", "excedencia",
    "laboral", "crm", "automatizar", "comparar", "versus", "frente", "a", "lab", "beta", "mi",
    "la", "de", "para", "quiero", "necesito", "estrategia", "Andratx", "CGI", "¿", "¡",
];

fn keyword_message() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(prop::sample::select(VOCABULARY), 0..30),
        any::<bool>(),
    )
        .prop_map(|(words, question)| {
            let mut message = words.join(" ");
            if question {
                message.push('?');
            }
            message
        })
}

fn any_message() -> impl Strategy<Value = String> {
    prop_oneof![".{0,200}", keyword_message()]
}

fn versions() -> VersionTriplet {
    VersionTriplet {
        schema_version: "1.0.0".to_string(),
        policy_mode: "policy-mode-v1".to_string(),
        domain_pack: "domain-pack-re-1.0".to_string(),
    }
}

proptest! {
    #[test]
    fn router_selects_one_to_three_domains(message in any_message()) {
        let plan = Router::new().route(&message).unwrap();
        prop_assert!((1..=3).contains(&plan.domains_selected.len()));

        let unique: HashSet<_> = plan.domains_selected.iter().collect();
        prop_assert_eq!(unique.len(), plan.domains_selected.len());
    }

    #[test]
    fn fast_plans_have_at_most_two_domains(message in any_message()) {
        let plan = Router::new().route(&message).unwrap();
        if plan.mode == Mode::Fast {
            prop_assert!(plan.domains_selected.len() <= 2);
        }
        prop_assert!(validation::validate_query_plan(&plan).is_ok());
    }

    #[test]
    fn decisions_respect_cardinalities(message in any_message()) {
        let plan = Router::new().route(&message).unwrap();
        let decision = Governor::default().evaluate(&plan).unwrap();

        prop_assert_eq!(decision.next_steps.len(), 3);
        prop_assert!((2..=5).contains(&decision.dont_do.len()));
        let unique: HashSet<_> = decision.dont_do.iter().collect();
        prop_assert_eq!(unique.len(), decision.dont_do.len());
    }

    #[test]
    fn confidence_never_rises_with_violations(message in any_message()) {
        let plan = Router::new().route(&message).unwrap();
        let decision = Governor::default().evaluate(&plan).unwrap();
        if !decision.violations.is_empty() {
            prop_assert!(decision.confidence <= plan.confidence);
        }
    }

    #[test]
    fn answers_contain_sections_in_order(message in any_message()) {
        let plan = Router::new().route(&message).unwrap();
        let decision = Governor::default().evaluate(&plan).unwrap();
        let document = StandardComposer::new().compose(&plan, &decision, &versions()).unwrap();

        let mut cursor = 0;
        for section in ANSWER_SECTIONS {
            let marker = section_marker(section);
            let found = document.answer[cursor..].find(&marker);
            prop_assert!(found.is_some(), "missing {}", section);
            cursor += found.unwrap_or(0) + marker.len();
        }
        prop_assert!(validation::validate_document(&document).is_ok());
    }
}
