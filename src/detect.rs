//! Risk-signal detection over intake text.
//!
//! Pure function over the given text and rule table: no side effects, no
//! store access. Detectors and the compliance scanner share the matching
//! mechanics in [`crate::rules`]; this layer folds matches into one weighted
//! signal per rule id.

use serde::{Deserialize, Serialize};

use crate::rules::{severity_weight, RuleTable, Severity};
use crate::util::{clamp_f64, normalize_text};

/// Base confidence for a single pattern hit.
const CONFIDENCE_BASE: f64 = 0.35;
/// Confidence gained per additional sub-match.
const CONFIDENCE_PER_MATCH: f64 = 0.2;
/// Confidence ceiling.
const CONFIDENCE_MAX: f64 = 0.95;

/// A single detected risk indicator. Ephemeral: lives in the response and
/// the trend counters, nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub confidence: f64,
    pub evidence: String,
    pub guidance: String,
}

impl Signal {
    /// Weight of this signal under the shared severity law.
    pub fn weight(&self) -> f64 {
        severity_weight(self.severity)
    }
}

/// Evaluate the rule table against input text and emit one weighted signal
/// per matched rule. A rule firing multiple times raises the aggregate
/// confidence instead of duplicating the signal.
pub fn detect(text: &str, rules: &RuleTable) -> Vec<Signal> {
    let normalized = normalize_text(text);

    rules
        .find_matches(&normalized)
        .into_iter()
        .map(|m| {
            let match_count = m.fragments.len();
            let confidence = clamp_f64(
                CONFIDENCE_BASE + match_count as f64 * CONFIDENCE_PER_MATCH,
                CONFIDENCE_BASE,
                CONFIDENCE_MAX,
            );

            Signal {
                id: m.rule.id.clone(),
                title: title_from_id(&m.rule.id),
                severity: m.rule.severity,
                confidence,
                evidence: format!("matched {}", m.fragments.join(", ")),
                guidance: m.rule.guidance.clone(),
            }
        })
        .collect()
}

/// Humanize a kebab-case rule id into a display title.
///
/// Example: "violence-threat" → "Violence threat"
fn title_from_id(id: &str) -> String {
    let spaced = id.replace('-', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
