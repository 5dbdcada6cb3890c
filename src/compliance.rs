//! Policy/privacy/safety scanning of drafted text.
//!
//! Runs the same rule mechanics as [`crate::detect`] against the compliance
//! table, but emits one issue per match (capped per rule) instead of one
//! aggregate signal per rule, plus fixed per-category metrics.

use serde::{Deserialize, Serialize};

use crate::rules::{severity_weight, RuleTable, Severity};
use crate::util::{fingerprint, normalize_text};

/// Per-category metric scaling: (factor, cap). metric = 100 − min(weighted
/// hits × factor, cap).
const CATEGORY_FACTORS: &[(&str, f64, f64)] = &[
    ("privacy", 18.0, 70.0),
    ("safety", 20.0, 80.0),
    ("legal", 16.0, 65.0),
    ("bias", 12.0, 50.0),
    ("policy", 10.0, 45.0),
];

/// Overall severity thresholds on the heaviest issue weight.
const OVERALL_HIGH_WEIGHT: f64 = 0.9;
const OVERALL_MEDIUM_WEIGHT: f64 = 0.55;

/// A labeled piece of text to scan (conversation summary, report draft,
/// negotiation script …). The engine never interprets the label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSegment {
    pub label: String,
    pub text: String,
}

/// One policy issue: a single rule match inside a single segment. The
/// fingerprint is stable across re-scans of the same text so callers can
/// dedup repeat findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceIssue {
    pub rule_id: String,
    pub category: String,
    pub severity: Severity,
    pub segment: String,
    pub excerpt: String,
    pub guidance: String,
    pub fingerprint: String,
}

/// Fixed five-category metric block, each on a 0–100 scale where 100 means
/// no findings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceMetrics {
    pub privacy: u8,
    pub safety: u8,
    pub legal: u8,
    pub bias: u8,
    pub policy: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub issues: Vec<ComplianceIssue>,
    pub metrics: ComplianceMetrics,
    pub overall_severity: Severity,
}

/// Scan labeled segments against the compliance rule table.
pub fn scan(segments: &[ComplianceSegment], rules: &RuleTable) -> ComplianceReport {
    let mut issues = Vec::new();

    for segment in segments {
        let normalized = normalize_text(&segment.text);
        for m in rules.find_matches(&normalized) {
            // One issue per match, already capped per rule by the table.
            for fragment in &m.fragments {
                issues.push(ComplianceIssue {
                    rule_id: m.rule.id.clone(),
                    category: m.rule.category.key().to_string(),
                    severity: m.rule.severity,
                    segment: segment.label.clone(),
                    excerpt: fragment.clone(),
                    guidance: m.rule.guidance.clone(),
                    fingerprint: fingerprint(&[&m.rule.id, &segment.label, fragment]),
                });
            }
        }
    }

    let metrics = compute_metrics(&issues);
    let overall_severity = overall_severity(&issues);

    ComplianceReport {
        issues,
        metrics,
        overall_severity,
    }
}

fn weighted_hits(issues: &[ComplianceIssue], category: &str) -> f64 {
    issues
        .iter()
        .filter(|i| i.category == category)
        .map(|i| severity_weight(i.severity))
        .sum()
}

fn compute_metrics(issues: &[ComplianceIssue]) -> ComplianceMetrics {
    let score = |category: &str| -> u8 {
        let (_, factor, cap) = CATEGORY_FACTORS
            .iter()
            .find(|(key, _, _)| *key == category)
            .copied()
            .unwrap_or((category, 12.0, 50.0));
        let penalty = (weighted_hits(issues, category) * factor).min(cap).max(0.0);
        (100.0 - penalty).round() as u8
    };

    ComplianceMetrics {
        privacy: score("privacy"),
        safety: score("safety"),
        legal: score("legal"),
        bias: score("bias"),
        policy: score("policy"),
    }
}

fn overall_severity(issues: &[ComplianceIssue]) -> Severity {
    let max_weight = issues
        .iter()
        .map(|i| severity_weight(i.severity))
        .fold(0.0_f64, f64::max);

    if max_weight >= OVERALL_HIGH_WEIGHT {
        Severity::High
    } else if max_weight >= OVERALL_MEDIUM_WEIGHT {
        Severity::Medium
    } else {
        Severity::Low
    }
}
