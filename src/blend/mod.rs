//! Deterministic/AI blending policy.
//!
//! The heuristic result is computed first and is always usable on its own.
//! The external generator gets one bounded attempt; a timeout, transport
//! error, or schema mismatch is treated identically to "absent". Whether
//! the external path contributed is explicit at the type level: callers
//! match on [`BlendOutcome`] instead of inspecting a flag buried in the
//! payload.

pub mod generator;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scoring::twin::{ConfidenceLabel, HeuristicAnalysis};
use crate::util::{clamp_f64, merge_dedup_capped};

pub use generator::{ExternalGenerator, GeneratorError, GeneratorRequest, HttpGenerator};

/// Blend weights: the external result leads, the heuristic anchors.
const EXTERNAL_WEIGHT: f64 = 0.6;
const HEURISTIC_WEIGHT: f64 = 0.4;
/// Merged list cap.
const LIST_CAP: usize = 6;
/// Score domain shared with the twin estimator.
const SCORE_MIN: f64 = 8.0;
const SCORE_MAX: f64 = 96.0;

/// Default bound on the single external attempt.
pub const DEFAULT_GENERATOR_TIMEOUT: Duration = Duration::from_secs(8);

/// Schema the external generator must satisfy. Anything that fails to
/// decode into this is treated as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAnalysis {
    pub success_rate: u8,
    #[serde(default)]
    pub key_factors: Vec<String>,
    #[serde(default)]
    pub risk_alerts: Vec<String>,
    #[serde(default)]
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub knowledge_base: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Final analysis after the blend decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalAnalysis {
    pub id: String,
    pub generated_at: chrono::DateTime<chrono::Utc>,
    pub success_rate: u8,
    pub confidence_label: ConfidenceLabel,
    pub key_factors: Vec<String>,
    pub risk_alerts: Vec<String>,
    pub recommended_actions: Vec<String>,
    #[serde(default)]
    pub knowledge_base: Vec<String>,
    pub timeline: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Which path produced the final analysis.
#[derive(Debug, Clone)]
pub enum BlendOutcome {
    /// External generator absent, failed, timed out, or schema-invalid.
    HeuristicOnly(FinalAnalysis),
    /// External result arrived in time and validated.
    Blended(FinalAnalysis),
}

impl BlendOutcome {
    pub fn mode(&self) -> &'static str {
        match self {
            BlendOutcome::HeuristicOnly(_) => "heuristic-only",
            BlendOutcome::Blended(_) => "blended",
        }
    }

    pub fn analysis(&self) -> &FinalAnalysis {
        match self {
            BlendOutcome::HeuristicOnly(a) | BlendOutcome::Blended(a) => a,
        }
    }

    pub fn into_analysis(self) -> FinalAnalysis {
        match self {
            BlendOutcome::HeuristicOnly(a) | BlendOutcome::Blended(a) => a,
        }
    }
}

/// Pure merge policy. With no external result the heuristic lists pass
/// through exactly as produced; no dedup, no cap, no re-ordering.
pub fn blend(heuristic: HeuristicAnalysis, external: Option<ExternalAnalysis>) -> BlendOutcome {
    let Some(external) = external else {
        return BlendOutcome::HeuristicOnly(FinalAnalysis {
            id: heuristic.id,
            generated_at: heuristic.generated_at,
            success_rate: heuristic.success_rate,
            confidence_label: heuristic.confidence_label,
            key_factors: heuristic.key_factors,
            risk_alerts: heuristic.risk_alerts,
            recommended_actions: heuristic.recommended_actions,
            knowledge_base: Vec::new(),
            timeline: heuristic.timeline,
            rationale: heuristic.rationale,
        });
    };

    let blended_score = clamp_f64(
        (external.success_rate as f64 * EXTERNAL_WEIGHT
            + heuristic.success_rate as f64 * HEURISTIC_WEIGHT)
            .round(),
        SCORE_MIN,
        SCORE_MAX,
    ) as u8;

    // External entries lead, first-seen order, case-insensitive dedup.
    let key_factors = merge_dedup_capped(&[&external.key_factors, &heuristic.key_factors], LIST_CAP);
    let risk_alerts = merge_dedup_capped(&[&external.risk_alerts, &heuristic.risk_alerts], LIST_CAP);
    let recommended_actions = merge_dedup_capped(
        &[&external.recommended_actions, &heuristic.recommended_actions],
        LIST_CAP,
    );
    let knowledge_base = merge_dedup_capped(&[&external.knowledge_base], LIST_CAP);

    let rationales: Vec<String> = [external.rationale, heuristic.rationale]
        .into_iter()
        .flatten()
        .collect();
    let rationale = match merge_dedup_capped(&[&rationales], 2) {
        merged if merged.is_empty() => None,
        merged => Some(merged.join(" ")),
    };

    BlendOutcome::Blended(FinalAnalysis {
        id: heuristic.id,
        generated_at: heuristic.generated_at,
        success_rate: blended_score,
        confidence_label: label_for(blended_score),
        key_factors,
        risk_alerts,
        recommended_actions,
        knowledge_base,
        timeline: heuristic.timeline,
        rationale,
    })
}

/// Same thresholds the twin estimator applies to its own score.
fn label_for(score: u8) -> ConfidenceLabel {
    if score >= 75 {
        ConfidenceLabel::High
    } else if score >= 55 {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    }
}

/// Owns the only call site of the external generator.
pub struct BlendOrchestrator {
    generator: Option<Arc<dyn ExternalGenerator>>,
    timeout: Duration,
}

impl BlendOrchestrator {
    /// Orchestrator with the external path disabled.
    pub fn heuristic_only() -> Self {
        Self {
            generator: None,
            timeout: DEFAULT_GENERATOR_TIMEOUT,
        }
    }

    pub fn with_generator(generator: Arc<dyn ExternalGenerator>, timeout: Duration) -> Self {
        Self {
            generator: Some(generator),
            timeout,
        }
    }

    /// Make the single bounded external attempt and merge. The heuristic
    /// result is already computed by the time this runs, so the external path
    /// can only add, never delay the deterministic answer past the timeout.
    pub async fn run(&self, request: &GeneratorRequest, heuristic: HeuristicAnalysis) -> BlendOutcome {
        let Some(generator) = &self.generator else {
            return blend(heuristic, None);
        };

        match tokio::time::timeout(self.timeout, generator.generate(request)).await {
            Ok(Ok(external)) => blend(heuristic, Some(external)),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "external generator failed; heuristic-only result");
                blend(heuristic, None)
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "external generator timed out; heuristic-only result");
                blend(heuristic, None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn heuristic(score: u8) -> HeuristicAnalysis {
        HeuristicAnalysis {
            id: "est-test".to_string(),
            generated_at: chrono::Utc::now(),
            success_rate: score,
            confidence_label: label_for(score),
            key_factors: vec!["Regular commute makes contact windows predictable.".to_string()],
            risk_alerts: vec!["Night shift cuts visibility and staffing options.".to_string()],
            recommended_actions: vec!["Assign a vehicle team before the first rotation.".to_string()],
            timeline: vec!["Phase 1: Intake and fact confirmation".to_string()],
            rationale: Some("Deterministic estimate from case factors.".to_string()),
        }
    }

    fn external(score: u8) -> ExternalAnalysis {
        ExternalAnalysis {
            success_rate: score,
            key_factors: vec!["Subject has a fixed weekday routine".to_string()],
            risk_alerts: vec!["NIGHT SHIFT cuts visibility and staffing options. ".to_string()],
            recommended_actions: vec!["Start with two-day route confirmation".to_string()],
            knowledge_base: vec!["Route-confirmation playbook".to_string()],
            rationale: Some("Model estimate from similar cases.".to_string()),
        }
    }

    #[test]
    fn test_absent_external_passes_heuristic_through() {
        let h = heuristic(70);
        let expected_factors = h.key_factors.clone();
        let outcome = blend(h, None);
        assert_eq!(outcome.mode(), "heuristic-only");
        let analysis = outcome.analysis();
        assert_eq!(analysis.success_rate, 70);
        assert_eq!(analysis.key_factors, expected_factors);
        assert!(analysis.knowledge_base.is_empty());
    }

    #[test]
    fn test_blend_weights_sixty_forty() {
        let outcome = blend(heuristic(50), Some(external(90)));
        assert_eq!(outcome.mode(), "blended");
        // 90 × 0.6 + 50 × 0.4 = 74
        assert_eq!(outcome.analysis().success_rate, 74);
        assert_eq!(outcome.analysis().confidence_label, ConfidenceLabel::Medium);
    }

    #[test]
    fn test_blended_score_reclamped() {
        let outcome = blend(heuristic(96), Some(external(100)));
        assert_eq!(outcome.analysis().success_rate, 96, "ceiling re-clamp");
    }

    #[test]
    fn test_merge_dedups_case_insensitive_external_first() {
        let outcome = blend(heuristic(60), Some(external(60)));
        let analysis = outcome.analysis();
        // The external risk alert differs only by case/whitespace: one entry.
        assert_eq!(analysis.risk_alerts.len(), 1);
        // External entry wins first-seen position.
        assert!(analysis.risk_alerts[0].starts_with("NIGHT SHIFT"));
        assert_eq!(analysis.key_factors.len(), 2);
        assert!(analysis.key_factors[0].contains("weekday routine"));
    }

    #[test]
    fn test_rationales_concatenated_once_each() {
        let outcome = blend(heuristic(60), Some(external(60)));
        let rationale = outcome.analysis().rationale.clone().expect("rationale");
        assert!(rationale.contains("Model estimate"));
        assert!(rationale.contains("Deterministic estimate"));
    }

    #[test]
    fn test_merged_lists_capped_at_six() {
        let mut ext = external(60);
        ext.key_factors = (0..10).map(|i| format!("external factor {}", i)).collect();
        let outcome = blend(heuristic(60), Some(ext));
        assert_eq!(outcome.analysis().key_factors.len(), 6);
    }

    struct FailingGenerator;

    #[async_trait]
    impl ExternalGenerator for FailingGenerator {
        async fn generate(&self, _request: &GeneratorRequest) -> Result<ExternalAnalysis, GeneratorError> {
            Err(GeneratorError::Http("connection refused".to_string()))
        }
    }

    struct SlowGenerator;

    #[async_trait]
    impl ExternalGenerator for SlowGenerator {
        async fn generate(&self, _request: &GeneratorRequest) -> Result<ExternalAnalysis, GeneratorError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            unreachable!("timeout fires first")
        }
    }

    struct HappyGenerator;

    #[async_trait]
    impl ExternalGenerator for HappyGenerator {
        async fn generate(&self, _request: &GeneratorRequest) -> Result<ExternalAnalysis, GeneratorError> {
            Ok(external(80))
        }
    }

    fn request() -> GeneratorRequest {
        GeneratorRequest {
            prompt: "estimate this case".to_string(),
        }
    }

    #[tokio::test]
    async fn test_orchestrator_without_generator() {
        let orchestrator = BlendOrchestrator::heuristic_only();
        let outcome = orchestrator.run(&request(), heuristic(70)).await;
        assert_eq!(outcome.mode(), "heuristic-only");
    }

    #[tokio::test]
    async fn test_orchestrator_falls_back_on_error() {
        let orchestrator = BlendOrchestrator::with_generator(
            Arc::new(FailingGenerator),
            Duration::from_secs(5),
        );
        let outcome = orchestrator.run(&request(), heuristic(70)).await;
        assert_eq!(outcome.mode(), "heuristic-only");
        assert_eq!(outcome.analysis().success_rate, 70);
    }

    #[tokio::test]
    async fn test_orchestrator_falls_back_on_timeout() {
        let orchestrator = BlendOrchestrator::with_generator(
            Arc::new(SlowGenerator),
            Duration::from_millis(50),
        );
        let outcome = orchestrator.run(&request(), heuristic(70)).await;
        assert_eq!(outcome.mode(), "heuristic-only");
    }

    #[tokio::test]
    async fn test_orchestrator_blends_on_success() {
        let orchestrator = BlendOrchestrator::with_generator(
            Arc::new(HappyGenerator),
            Duration::from_secs(5),
        );
        let outcome = orchestrator.run(&request(), heuristic(50)).await;
        assert_eq!(outcome.mode(), "blended");
        // 80 × 0.6 + 50 × 0.4 = 68
        assert_eq!(outcome.analysis().success_rate, 68);
    }
}
