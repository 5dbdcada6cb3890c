//! Alert derivation from trend history + the current detection pass.
//!
//! Five independent rules, evaluated least → most specific and merged by
//! alert id (last write wins). Alerts are derived values, recomputed on
//! every call, never persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Signal;
use crate::rules::Severity;
use crate::trend::store::TrendSnapshot;

/// Detections inside this window trip the spike rule.
const SPIKE_WINDOW_HOURS: i64 = 24;
const SPIKE_THRESHOLD: usize = 3;
/// Detections across the full 7-day window that trip the cumulative rule.
const CUMULATIVE_THRESHOLD: usize = 6;

/// Urgency phrases that force an alert regardless of trend state.
const URGENT_MARKERS: &[&str] = &[
    "즉시", "긴급", "오늘 안에", "당장", "immediate", "urgent", "asap", "right away",
];

/// Case-type keywords that flag a recurring corporate/internal pattern.
const CORPORATE_MARKERS: &[&str] = &[
    "기업", "사내", "회사", "내부", "직원", "corporate", "internal", "workplace", "employee",
];

/// A derived alert. Not persisted; callers may sort by severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub message: String,
    pub suggestion: String,
}

/// Derive alerts from the pruned snapshot set and the signals detected in
/// the current pass.
pub fn derive_alerts(
    snapshots: &[TrendSnapshot],
    current_signals: &[Signal],
    case_urgency: Option<&str>,
    case_type: Option<&str>,
) -> Vec<Alert> {
    derive_alerts_at(snapshots, current_signals, case_urgency, case_type, Utc::now())
}

/// `derive_alerts` with an explicit clock. Useful for testing window math.
pub fn derive_alerts_at(
    snapshots: &[TrendSnapshot],
    current_signals: &[Signal],
    case_urgency: Option<&str>,
    case_type: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut merged: HashMap<String, Alert> = HashMap::new();
    let mut push = |alert: Alert| {
        merged.insert(alert.id.clone(), alert);
    };

    // Rules 1 + 2: per-snapshot frequency. A spike short-circuits the
    // 7-day cumulative check for that snapshot.
    for snapshot in snapshots {
        let in_24h = snapshot.detections_within(now, SPIKE_WINDOW_HOURS);
        if in_24h >= SPIKE_THRESHOLD && snapshot.severity != Severity::Low {
            push(Alert {
                id: format!("trend-{}", snapshot.signal_id),
                title: format!("{} frequency increase", snapshot.title),
                severity: Severity::High,
                message: format!(
                    "'{}' detected {} times in the last 24 hours.",
                    snapshot.title, in_24h
                ),
                suggestion: "Escalate to an operator; repeated detections in a single day rarely stay isolated.".to_string(),
            });
            continue;
        }

        let in_window = snapshot.recent_detections.len();
        if in_window >= CUMULATIVE_THRESHOLD {
            // Low-severity signals still matter once they persist all week.
            let severity = if snapshot.severity == Severity::Low {
                Severity::Medium
            } else {
                snapshot.severity
            };
            push(Alert {
                id: format!("trend-{}", snapshot.signal_id),
                title: format!("{} recurring this week", snapshot.title),
                severity,
                message: format!(
                    "'{}' detected {} times over the trailing 7 days.",
                    snapshot.title, in_window
                ),
                suggestion: "Review the case history for a sustained pattern before the next client response.".to_string(),
            });
        }
    }

    // Rule 3: urgency override.
    if let Some(urgency) = case_urgency {
        let lowered = urgency.to_lowercase();
        if URGENT_MARKERS.iter().any(|m| lowered.contains(m)) {
            push(Alert {
                id: "urgent-response".to_string(),
                title: "Urgent response requested".to_string(),
                severity: Severity::High,
                message: format!("Client marked the case urgency as '{}'.", urgency),
                suggestion: "Prioritize assignment and confirm first contact within the hour.".to_string(),
            });
        }
    }

    // Rule 4: case-type category pattern.
    if let Some(case_type) = case_type {
        let lowered = case_type.to_lowercase();
        if CORPORATE_MARKERS.iter().any(|m| lowered.contains(m)) {
            push(Alert {
                id: "case-type-pattern".to_string(),
                title: "Corporate case pattern detected".to_string(),
                severity: Severity::Medium,
                message: format!("Case type '{}' matches the corporate/internal pattern.", case_type),
                suggestion: "Check for related open cases from the same organization.".to_string(),
            });
        }
    }

    // Rule 5: multiple concurrent high-severity signals.
    let high_count = current_signals
        .iter()
        .filter(|s| s.severity == Severity::High)
        .count();
    if high_count > 1 {
        push(Alert {
            id: "compound-risk".to_string(),
            title: "Compound risk".to_string(),
            severity: Severity::High,
            message: format!(
                "{} high-severity signals detected in the same pass.",
                high_count
            ),
            suggestion: "Treat the signals as one situation, not separate findings; brief an operator.".to_string(),
        });
    }

    merged.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(
        id: &str,
        severity: Severity,
        detections: Vec<DateTime<Utc>>,
    ) -> TrendSnapshot {
        TrendSnapshot {
            signal_id: id.to_string(),
            title: id.replace('-', " "),
            severity,
            total_count: detections.len() as i64,
            last_detected_at: detections.last().copied(),
            recent_detections: detections,
        }
    }

    fn high_signal(id: &str) -> Signal {
        Signal {
            id: id.to_string(),
            title: id.to_string(),
            severity: Severity::High,
            confidence: 0.75,
            evidence: String::new(),
            guidance: String::new(),
        }
    }

    #[test]
    fn test_spike_beats_cumulative() {
        let now = Utc::now();
        // 6 detections, 4 of them inside 24h: qualifies for both rules.
        let detections: Vec<_> = (0..6)
            .map(|i| now - Duration::hours(if i < 4 { i * 3 } else { 48 + i * 10 }))
            .collect();
        let snapshots = vec![snapshot("violence-threat", Severity::High, detections)];

        let alerts = derive_alerts_at(&snapshots, &[], None, None, now);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].title.contains("frequency increase"));
        assert_eq!(alerts[0].severity, Severity::High);
    }

    #[test]
    fn test_spike_requires_three_in_24h() {
        let now = Utc::now();
        let detections = vec![now - Duration::hours(2), now - Duration::hours(5)];
        let snapshots = vec![snapshot("violence-threat", Severity::High, detections)];
        let alerts = derive_alerts_at(&snapshots, &[], None, None, now);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_spike_ignores_low_severity() {
        let now = Utc::now();
        let detections: Vec<_> = (0..4).map(|i| now - Duration::hours(i)).collect();
        let snapshots = vec![snapshot("debt-evasion", Severity::Low, detections)];
        let alerts = derive_alerts_at(&snapshots, &[], None, None, now);
        assert!(alerts.is_empty(), "low severity never spikes");
    }

    #[test]
    fn test_cumulative_promotes_low_to_medium() {
        let now = Utc::now();
        let detections: Vec<_> = (0..6)
            .map(|i| now - Duration::days(1) - Duration::hours(i * 12))
            .collect();
        let snapshots = vec![snapshot("debt-evasion", Severity::Low, detections)];
        let alerts = derive_alerts_at(&snapshots, &[], None, None, now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert!(alerts[0].title.contains("recurring"));
    }

    #[test]
    fn test_urgency_override_fires_without_trends() {
        let alerts = derive_alerts_at(&[], &[], Some("긴급"), None, Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "urgent-response");
        assert_eq!(alerts[0].severity, Severity::High);
    }

    #[test]
    fn test_case_type_pattern() {
        let alerts = derive_alerts_at(&[], &[], None, Some("사내 횡령 조사"), Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "case-type-pattern");
        assert_eq!(alerts[0].severity, Severity::Medium);
    }

    #[test]
    fn test_compound_risk_needs_two_highs() {
        let one = vec![high_signal("violence-threat")];
        let alerts = derive_alerts_at(&[], &one, None, None, Utc::now());
        assert!(alerts.is_empty());

        let two = vec![high_signal("violence-threat"), high_signal("legal-deadline")];
        let alerts = derive_alerts_at(&[], &two, None, None, Utc::now());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "compound-risk");
    }

    #[test]
    fn test_alert_ids_deduplicate() {
        let now = Utc::now();
        let detections: Vec<_> = (0..4).map(|i| now - Duration::hours(i)).collect();
        let snapshots = vec![
            snapshot("violence-threat", Severity::High, detections.clone()),
            snapshot("violence-threat", Severity::High, detections),
        ];
        let alerts = derive_alerts_at(&snapshots, &[], None, None, now);
        assert_eq!(alerts.len(), 1, "same id merges, last write wins");
    }
}
