//! Synthesizer
//!
//! Renders a `Decision` into a five-section `DecisionDocument`. The composer
//! call is retried with exponential backoff; if it still fails, a degraded
//! document with `low` confidence is returned instead. Only a failure of the
//! fallback itself, or a contract violation, is a hard error.

pub mod composer;
pub mod retry;

use uuid::Uuid;

use crate::config::{PipelineConfig, RetryConfig};
use crate::contracts::{
    ConfidenceLevel, Decision, DecisionDocument, DocumentMeta, EvidenceView, QueryPlan,
    VersionTriplet,
};
use crate::error::{codes, PipelineError, Result};
use crate::validation;
pub use composer::{Composer, StandardComposer};
pub use retry::{retry_with_backoff, RetryOutcome};

/// A document produced by the Synthesizer.
///
/// `recovered_from` is set when the document is the degraded fallback; it
/// carries the error that triggered the fallback.
#[derive(Debug, Clone)]
pub struct SynthesisOutcome {
    pub document: DecisionDocument,
    pub recovered_from: Option<String>,
    /// Composer attempts made, including the first
    pub attempts: u32,
}

impl SynthesisOutcome {
    pub fn is_degraded(&self) -> bool {
        self.recovered_from.is_some()
    }
}

pub struct Synthesizer {
    composer: Box<dyn Composer>,
    retry: RetryConfig,
    versions: VersionTriplet,
}

impl Synthesizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_composer(config, Box::new(StandardComposer::new()))
    }

    pub fn with_composer(config: &PipelineConfig, composer: Box<dyn Composer>) -> Self {
        Self {
            composer,
            retry: config.retry.clone(),
            versions: VersionTriplet {
                schema_version: config.schema_version.clone(),
                policy_mode: config.policy_mode_version.clone(),
                domain_pack: config.domain_pack_version.clone(),
            },
        }
    }

    pub fn composer_name(&self) -> &str {
        self.composer.name()
    }

    pub fn versions(&self) -> &VersionTriplet {
        &self.versions
    }

    pub async fn synthesize(
        &self,
        plan: &QueryPlan,
        decision: &Decision,
    ) -> Result<SynthesisOutcome> {
        let outcome = retry_with_backoff(&self.retry, |_| {
            std::future::ready(self.compose_validated(plan, decision))
        })
        .await;
        let attempts = outcome.attempts;

        match outcome.result {
            Ok(document) => {
                tracing::debug!(
                    output_id = %document.output_id,
                    composer = self.composer.name(),
                    attempts = attempts,
                    "Synthesized document"
                );
                Ok(SynthesisOutcome {
                    document,
                    recovered_from: None,
                    attempts,
                })
            }
            Err(e) if e.is_validation() => Err(e),
            Err(e) => {
                tracing::warn!(
                    composer = self.composer.name(),
                    attempts = attempts,
                    error = %e,
                    "Composer failed, returning degraded document"
                );
                let document = self.degraded(plan, decision, &e.to_string()).map_err(|fallback| {
                    PipelineError::synthesizer(format!(
                        "fallback failed after '{}': {}",
                        e, fallback
                    ))
                })?;
                Ok(SynthesisOutcome {
                    document,
                    recovered_from: Some(e.to_string()),
                    attempts,
                })
            }
        }
    }

    fn compose_validated(&self, plan: &QueryPlan, decision: &Decision) -> Result<DecisionDocument> {
        let document = self.composer.compose(plan, decision, &self.versions)?;
        validation::validate_document(&document)
            .map_err(|f| PipelineError::validation(codes::SYNTHESIZER_VALIDATION_FAILED, f))?;
        Ok(document)
    }

    /// Same shape as a normal document, built only from the recommendation
    fn degraded(
        &self,
        plan: &QueryPlan,
        decision: &Decision,
        error: &str,
    ) -> Result<DecisionDocument> {
        let label = composer::recommendation_label(decision.recommendation);
        let mut answer = String::new();

        composer::push_section(&mut answer, "Diagnosis");
        answer.push_str(&format!(
            "An error occurred while preparing the full analysis ({}). This is a reduced answer.\n\n",
            error
        ));
        composer::push_section(&mut answer, "Recommendation");
        answer.push_str(&format!("**{}**.\n\n", label));
        composer::push_section(&mut answer, "Risks");
        answer.push_str("- Not available in degraded mode.\n\n");
        composer::push_section(&mut answer, "Next Steps");
        answer.push_str("- Retry the query to obtain the full analysis.\n\n");
        composer::push_section(&mut answer, "Prohibitions");
        answer.push_str("- Do not act on this answer without the full analysis.\n");

        let document = DecisionDocument {
            output_id: Uuid::new_v4(),
            answer,
            meta: DocumentMeta {
                mode: plan.mode,
                domain_hint: plan.domain_hint.clone(),
                confidence: ConfidenceLevel::Low,
                flags: vec![
                    DecisionDocument::DEGRADED_FLAG.to_string(),
                    DecisionDocument::RECOVERY_FLAG.to_string(),
                ],
                recommendation: decision.recommendation,
                risk_summary: composer::risk_summary(decision),
                versions: self.versions.clone(),
            },
            plan: composer::plan_view(plan),
            trace: composer::trace(plan, decision),
            evidence: EvidenceView::not_available(),
        };

        validation::validate_document(&document)
            .map_err(|f| PipelineError::validation(codes::SYNTHESIZER_VALIDATION_FAILED, f))?;
        Ok(document)
    }
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer")
            .field("composer", &self.composer.name())
            .field("retry", &self.retry)
            .field("versions", &self.versions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::VersionTriplet;
    use crate::governor::Governor;
    use crate::router::Router;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::{Duration, Instant};

    struct FlakyComposer {
        failures: u32,
        calls: AtomicU32,
    }

    impl Composer for FlakyComposer {
        fn name(&self) -> &str {
            "flaky"
        }

        fn compose(
            &self,
            plan: &QueryPlan,
            decision: &Decision,
            versions: &VersionTriplet,
        ) -> Result<DecisionDocument> {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
                return Err(PipelineError::synthesizer("composer unavailable"));
            }
            StandardComposer.compose(plan, decision, versions)
        }
    }

    struct BrokenComposer;

    impl Composer for BrokenComposer {
        fn name(&self) -> &str {
            "broken"
        }

        fn compose(
            &self,
            plan: &QueryPlan,
            decision: &Decision,
            versions: &VersionTriplet,
        ) -> Result<DecisionDocument> {
            let mut doc = StandardComposer.compose(plan, decision, versions)?;
            doc.answer = "no sections".to_string();
            Ok(doc)
        }
    }

    fn inputs() -> (QueryPlan, Decision) {
        let plan = Router::new()
            .route("¿Cuál es el precio de mercado para una villa en Andratx?")
            .unwrap();
        let decision = Governor::new("policy-mode-v1").evaluate(&plan).unwrap();
        (plan, decision)
    }

    fn config(retry: RetryConfig) -> PipelineConfig {
        PipelineConfig::builder().retry(retry).build()
    }

    #[tokio::test]
    async fn test_synthesis_is_idempotent() {
        let (plan, decision) = inputs();
        let synthesizer = Synthesizer::new(&PipelineConfig::default());

        let a = synthesizer.synthesize(&plan, &decision).await.unwrap();
        let b = synthesizer.synthesize(&plan, &decision).await.unwrap();

        assert_eq!(a.document.answer, b.document.answer);
        assert_eq!(a.document.meta, b.document.meta);
        assert_eq!(a.document.plan, b.document.plan);
        assert_ne!(a.document.trace.trace_id, b.document.trace.trace_id);
        assert!(!a.is_degraded());
    }

    #[tokio::test]
    async fn test_recovers_after_two_failures() {
        let (plan, decision) = inputs();
        let retry = RetryConfig {
            base_delay_ms: 20,
            max_jitter_ms: 0,
            ..RetryConfig::default()
        };
        let synthesizer = Synthesizer::with_composer(
            &config(retry),
            Box::new(FlakyComposer {
                failures: 2,
                calls: AtomicU32::new(0),
            }),
        );

        let started = Instant::now();
        let outcome = synthesizer.synthesize(&plan, &decision).await.unwrap();

        assert!(!outcome.is_degraded());
        assert!(!outcome.document.is_degraded());
        assert_eq!(outcome.attempts, 3);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_degrades_when_retries_exhausted() {
        let (plan, decision) = inputs();
        let synthesizer = Synthesizer::with_composer(
            &config(RetryConfig::immediate(3)),
            Box::new(FlakyComposer {
                failures: u32::MAX,
                calls: AtomicU32::new(0),
            }),
        );

        let outcome = synthesizer.synthesize(&plan, &decision).await.unwrap();
        let doc = &outcome.document;

        assert!(outcome.recovered_from.unwrap().contains("composer unavailable"));
        assert!(doc.is_degraded());
        assert_eq!(doc.meta.confidence, ConfidenceLevel::Low);
        assert_eq!(
            doc.meta.flags,
            vec!["degraded-output".to_string(), "error-recovery".to_string()]
        );
        assert_eq!(doc.meta.recommendation, decision.recommendation);
        assert!(validation::validate_document(doc).is_ok());
    }

    #[tokio::test]
    async fn test_validation_failure_is_hard_error() {
        let (plan, decision) = inputs();
        let synthesizer =
            Synthesizer::with_composer(&config(RetryConfig::immediate(3)), Box::new(BrokenComposer));

        let err = synthesizer.synthesize(&plan, &decision).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation {
                code: codes::SYNTHESIZER_VALIDATION_FAILED,
                ..
            }
        ));
    }
}
