//! Deterministic weighted scoring.
//!
//! Both pipelines (the case risk estimator and the candidate matcher)
//! share one law: start from a base score, apply bounded deltas per observed
//! factor, clamp to a declared range. Every applied delta is paired with
//! exactly one user-facing explanation string; the accumulator API makes a
//! silent number impossible.

pub mod matching;
pub mod twin;

use serde::{Deserialize, Serialize};

pub use matching::{match_candidates, CandidateProfile, MatchContext, MatchResult};
pub use twin::{estimate, FixedFactors, HeuristicAnalysis};

/// Overall case risk band, used to weight candidate scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

/// Candidate-score multiplier per case risk band.
pub fn risk_weight(level: RiskLevel) -> f64 {
    match level {
        RiskLevel::High => 1.15,
        RiskLevel::Medium => 1.05,
        RiskLevel::Low => 0.95,
    }
}

/// Running score with its paired explanations.
#[derive(Debug, Clone)]
pub struct ScoreAccumulator {
    pub score: f64,
    pub key_factors: Vec<String>,
    pub risk_alerts: Vec<String>,
    pub recommended_actions: Vec<String>,
}

impl ScoreAccumulator {
    pub fn new(base: f64) -> Self {
        Self {
            score: base,
            key_factors: Vec::new(),
            risk_alerts: Vec::new(),
            recommended_actions: Vec::new(),
        }
    }

    /// Add a positive delta and record the factor that earned it.
    pub fn credit(&mut self, delta: f64, key_factor: &str) {
        self.score += delta;
        self.key_factors.push(key_factor.to_string());
    }

    /// Subtract `delta` (given as a positive magnitude) and record the risk
    /// that caused it.
    pub fn debit(&mut self, delta: f64, risk_alert: &str) {
        self.score -= delta;
        self.risk_alerts.push(risk_alert.to_string());
    }

    /// Record a recommended action without touching the score.
    pub fn recommend(&mut self, action: &str) {
        self.recommended_actions.push(action.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_weight_ordering() {
        assert!(risk_weight(RiskLevel::High) > risk_weight(RiskLevel::Medium));
        assert!(risk_weight(RiskLevel::Medium) > risk_weight(RiskLevel::Low));
    }

    #[test]
    fn test_accumulator_pairs_deltas_with_explanations() {
        let mut acc = ScoreAccumulator::new(62.0);
        acc.credit(7.0, "three-operative rotation");
        acc.debit(6.0, "target moves by car");
        acc.recommend("assign a vehicle team");

        assert!((acc.score - 63.0).abs() < 1e-9);
        assert_eq!(acc.key_factors.len(), 1);
        assert_eq!(acc.risk_alerts.len(), 1);
        assert_eq!(acc.recommended_actions.len(), 1);
    }
}
