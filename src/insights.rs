//! Combined realtime-insights pipeline.
//!
//! One call per chat turn: validate the input shape, detect signals over
//! the conversation + case summary, fold the pass into the trend store,
//! derive alerts, and assemble the deterministic response: risk score,
//! ranked corpus recommendations, action plan, flow simulation, follow-up
//! questions, summary. Everything here is pure computation except the one
//! trend-store write.

use chrono::{DateTime, Utc};

use crate::detect::{detect, Signal};
use crate::error::EngineError;
use crate::rules::{RuleTable, Severity};
use crate::scoring::RiskLevel;
use crate::trend::{derive_alerts_at, TrendStore};
use crate::types::{
    ActionPlan, FlowPhase, FlowSimulation, InsightsInput, RealtimeInsights, Recommendation,
};
use crate::util::{clamp_i64, merge_dedup_capped, tokenize};

/// Risk-score law: base plus per-signal severity points plus a confidence
/// kicker, clamped to [0, 100].
const RISK_BASE: i64 = 12;
const RISK_POINTS_HIGH: i64 = 26;
const RISK_POINTS_MEDIUM: i64 = 14;
const RISK_POINTS_LOW: i64 = 6;
const RISK_CONFIDENCE_KICKER: f64 = 10.0;

/// Overall-risk thresholds on the 0–100 score.
const OVERALL_HIGH_ABOVE: i64 = 60;
const OVERALL_MEDIUM_ABOVE: i64 = 30;

const MAX_RECOMMENDATIONS: usize = 4;
const MAX_FOLLOW_UPS: usize = 4;
const MAX_NEXT_ACTIONS: usize = 5;

/// Minimum Jaro–Winkler similarity for a fuzzy token↔tag hit.
const FUZZY_THRESHOLD: f64 = 0.88;
const FUZZY_HIT_VALUE: f64 = 0.6;

/// Built-in guidance corpus ranked for the recommendations block.
struct CorpusEntry {
    id: &'static str,
    title: &'static str,
    summary: &'static str,
    tags: &'static [&'static str],
}

const CORPUS: &[CorpusEntry] = &[
    CorpusEntry {
        id: "evidence-preservation",
        title: "Evidence preservation checklist",
        summary: "Capture originals first: export chats, photograph documents, back up recordings before anything is edited or deleted.",
        tags: &["evidence", "증거", "threat", "협박", "message", "문자", "recording"],
    },
    CorpusEntry {
        id: "legal-counsel-referral",
        title: "When to involve counsel",
        summary: "Deadlines, summons, and statute-of-limitation questions go to a lawyer before field work starts.",
        tags: &["legal", "deadline", "기한", "소송", "summons", "counsel", "법률"],
    },
    CorpusEntry {
        id: "protective-measures",
        title: "Personal protection basics",
        summary: "Vary routes, log every contact attempt, and brief one trusted person on your schedule.",
        tags: &["threat", "협박", "stalking", "스토킹", "safety", "protection", "신변보호"],
    },
    CorpusEntry {
        id: "harassment-documentation",
        title: "Harassment incident log",
        summary: "A dated incident log with screenshots is the single strongest artifact for repeated-contact cases.",
        tags: &["harassment", "괴롭힘", "repeated", "contact", "log"],
    },
    CorpusEntry {
        id: "missing-person-first-steps",
        title: "First 48 hours of a trace",
        summary: "Last confirmed sighting, phone activity, and bank activity fix the search perimeter; collect them before interviews.",
        tags: &["missing", "실종", "trace", "연락두절", "disappeared", "소재파악"],
    },
    CorpusEntry {
        id: "asset-recovery-steps",
        title: "Asset trace groundwork",
        summary: "Registry extracts and transaction records narrow the target set before any field inquiry is worth its cost.",
        tags: &["asset", "자산", "debt", "채권", "fraud", "사기", "recovery"],
    },
    CorpusEntry {
        id: "digital-forensics-intake",
        title: "Digital forensics intake",
        summary: "Stop using the affected device, note account names and timestamps, and image storage before login attempts.",
        tags: &["digital", "디지털", "leak", "유출", "privacy", "account", "forensics"],
    },
    CorpusEntry {
        id: "corporate-investigation-protocol",
        title: "Workplace case protocol",
        summary: "Internal cases need HR and legal alignment on scope before evidence collection touches employee data.",
        tags: &["corporate", "기업", "internal", "사내", "workplace", "employee", "직원"],
    },
    CorpusEntry {
        id: "fee-escrow-guidance",
        title: "Milestone payments",
        summary: "Structure fees against deliverables held in escrow; never release the full amount before the first report.",
        tags: &["fee", "budget", "비용", "escrow", "payment", "선입금"],
    },
    CorpusEntry {
        id: "stakeout-preparation",
        title: "Stakeout preparation",
        summary: "Fix the observation post, camera angles, and relief schedule before the first shift, not during it.",
        tags: &["stakeout", "잠복", "surveillance", "미행", "observation"],
    },
];

/// Run the full pipeline. The only side effect is the trend-store record.
pub fn realtime_insights(
    input: &InsightsInput,
    rules: &RuleTable,
    store: &TrendStore,
) -> Result<RealtimeInsights, EngineError> {
    realtime_insights_at(input, rules, store, Utc::now())
}

/// `realtime_insights` with an explicit clock. Useful for testing.
pub fn realtime_insights_at(
    input: &InsightsInput,
    rules: &RuleTable,
    store: &TrendStore,
    now: DateTime<Utc>,
) -> Result<RealtimeInsights, EngineError> {
    validate(input)?;

    let text = gather_text(input);
    let signals = detect(&text, rules);
    let snapshots = store.record_at(&signals, now);

    let summary = input.case_summary.as_ref();
    let urgency = summary.and_then(|s| s.urgency.as_deref());
    let case_type = summary.and_then(|s| s.case_type.as_deref());
    let alerts = derive_alerts_at(&snapshots, &signals, urgency, case_type, now);

    let risk_score = risk_score(&signals);
    let overall_risk = overall_risk_for(risk_score);

    let tokens = tokenize(&text);
    let recommendations = rank_corpus(&tokens);

    Ok(RealtimeInsights {
        generated_at: now,
        risk_score,
        overall_risk,
        next_actions: next_actions(&signals, summary),
        action_plan: action_plan(&signals, summary, overall_risk),
        flow_simulation: flow_simulation(&signals, case_type),
        follow_up_questions: follow_up_questions(summary),
        summary: compose_summary(&signals, risk_score, overall_risk, urgency),
        signals,
        alerts,
        recommendations,
    })
}

fn validate(input: &InsightsInput) -> Result<(), EngineError> {
    if input.messages.is_empty() {
        return Err(EngineError::InvalidInput(
            "messages array is empty".to_string(),
        ));
    }
    if input
        .messages
        .iter()
        .all(|m| m.content.trim().is_empty())
    {
        return Err(EngineError::InvalidInput(
            "messages carry no content".to_string(),
        ));
    }
    Ok(())
}

/// Concatenate every text source the detector should see.
fn gather_text(input: &InsightsInput) -> String {
    let mut text = String::new();
    for message in &input.messages {
        text.push_str(&message.content);
        text.push('\n');
    }
    if let Some(summary) = &input.case_summary {
        for field in [
            &summary.title,
            &summary.case_type,
            &summary.primary_intent,
            &summary.objective,
            &summary.urgency,
        ]
        .into_iter()
        .flatten()
        {
            text.push_str(field);
            text.push('\n');
        }
        for fact in &summary.key_facts {
            text.push_str(fact);
            text.push('\n');
        }
    }
    for keyword in &input.keywords {
        text.push_str(keyword);
        text.push('\n');
    }
    if let Some(prior) = &input.prior_summary {
        text.push_str(prior);
    }
    text
}

fn risk_score(signals: &[Signal]) -> u8 {
    let mut score = RISK_BASE;
    for signal in signals {
        score += match signal.severity {
            Severity::High => RISK_POINTS_HIGH,
            Severity::Medium => RISK_POINTS_MEDIUM,
            Severity::Low => RISK_POINTS_LOW,
        };
        score += (signal.confidence * RISK_CONFIDENCE_KICKER).round() as i64;
    }
    clamp_i64(score, 0, 100) as u8
}

fn overall_risk_for(score: u8) -> RiskLevel {
    let score = score as i64;
    if score > OVERALL_HIGH_ABOVE {
        RiskLevel::High
    } else if score > OVERALL_MEDIUM_ABOVE {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Rank corpus entries by token overlap with the case, with a fuzzy assist
/// for near-miss spellings. Top four, matches only.
fn rank_corpus(tokens: &[String]) -> Vec<Recommendation> {
    let mut scored: Vec<Recommendation> = CORPUS
        .iter()
        .filter_map(|entry| {
            let mut score = 0.0;
            for tag in entry.tags {
                if tokens.iter().any(|t| t == tag) {
                    score += 1.0;
                } else if tokens
                    .iter()
                    .any(|t| strsim::jaro_winkler(t, tag) >= FUZZY_THRESHOLD)
                {
                    score += FUZZY_HIT_VALUE;
                }
            }
            if score > 0.0 {
                Some(Recommendation {
                    id: entry.id.to_string(),
                    title: entry.title.to_string(),
                    summary: entry.summary.to_string(),
                    score,
                })
            } else {
                None
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    scored.truncate(MAX_RECOMMENDATIONS);
    scored
}

fn next_actions(signals: &[Signal], summary: Option<&crate::types::CaseSummary>) -> Vec<String> {
    let guidance: Vec<String> = signals.iter().map(|s| s.guidance.clone()).collect();
    let missing: Vec<String> = summary
        .map(|s| {
            s.missing_details
                .iter()
                .map(|d| format!("Confirm {}", d))
                .collect()
        })
        .unwrap_or_default();

    let merged = merge_dedup_capped(&[&guidance, &missing], MAX_NEXT_ACTIONS);
    if merged.is_empty() {
        vec!["Continue intake and capture the core facts of the case.".to_string()]
    } else {
        merged
    }
}

fn action_plan(
    signals: &[Signal],
    summary: Option<&crate::types::CaseSummary>,
    overall_risk: RiskLevel,
) -> ActionPlan {
    let focus = summary
        .and_then(|s| s.primary_intent.clone().or_else(|| s.case_type.clone()))
        .unwrap_or_else(|| "Initial fact-finding".to_string());

    let mut success_criteria = Vec::new();
    if let Some(objective) = summary.and_then(|s| s.objective.clone()) {
        success_criteria.push(objective);
    }
    success_criteria.push("Evidence package accepted by the client".to_string());
    if matches!(overall_risk, RiskLevel::High) {
        success_criteria.push("No safety incident during the engagement".to_string());
    }

    let docs: Vec<String> = summary
        .map(|s| {
            s.recommended_documents
                .iter()
                .map(|d| format!("Secure {}", d))
                .collect()
        })
        .unwrap_or_default();
    let guidance: Vec<String> = signals
        .iter()
        .filter(|s| s.severity >= Severity::Medium)
        .map(|s| s.guidance.clone())
        .collect();
    let mut items = merge_dedup_capped(&[&docs, &guidance], 6);
    if items.is_empty() {
        items.push("Draft the engagement scope with the client".to_string());
    }

    let notes = match overall_risk {
        RiskLevel::High => "High-risk case: operator review before any client-facing step.",
        RiskLevel::Medium => "Moderate risk: keep the client informed at each milestone.",
        RiskLevel::Low => "Routine risk profile; standard cadence applies.",
    }
    .to_string();

    ActionPlan {
        focus,
        success_criteria,
        notes,
        items,
    }
}

/// Phase templates per case type keyword; generic otherwise.
fn flow_simulation(signals: &[Signal], case_type: Option<&str>) -> FlowSimulation {
    let lowered = case_type.map(|s| s.to_lowercase()).unwrap_or_default();

    let phases: Vec<FlowPhase> = if lowered.contains("실종") || lowered.contains("missing") {
        vec![
            phase("Perimeter fix", 2, "Last sighting, phone and account activity"),
            phase("Field trace", 5, "Interviews and route coverage"),
            phase("Handoff", 1, "Findings brief, authorities if warranted"),
        ]
    } else if lowered.contains("기업") || lowered.contains("corporate") || lowered.contains("internal") || lowered.contains("사내") {
        vec![
            phase("Scope alignment", 2, "HR and legal sign-off on evidence boundaries"),
            phase("Records review", 4, "Access logs, expense and communication records"),
            phase("Interviews", 3, "Structured interviews with involved staff"),
            phase("Report", 2, "Findings with document appendix"),
        ]
    } else if lowered.contains("미행") || lowered.contains("외도") || lowered.contains("surveil") {
        vec![
            phase("Pattern baseline", 2, "Routine confirmation before active work"),
            phase("Active surveillance", 5, "Coverage on confirmed windows"),
            phase("Evidence package", 2, "Time-stamped media and movement log"),
        ]
    } else {
        vec![
            phase("Intake", 1, "Fact confirmation and scope"),
            phase("Investigation", 6, "Field and records work"),
            phase("Report", 2, "Deliverable and debrief"),
        ]
    };

    let total: u32 = phases.iter().map(|p| p.duration_days).sum();

    let resource_notes = vec![
        "One case manager owns client communication end to end".to_string(),
        "Field staffing follows the scenario variables, not the default roster".to_string(),
    ];

    let risk_notes: Vec<String> = {
        let highs: Vec<String> = signals
            .iter()
            .filter(|s| s.severity == Severity::High)
            .take(3)
            .map(|s| format!("{} remains open", s.title))
            .collect();
        if highs.is_empty() {
            vec!["No elevated risk carried into planning".to_string()]
        } else {
            highs
        }
    };

    let checkpoints = vec![
        "Client review at the end of each phase".to_string(),
        "Compliance scan before any document leaves the case file".to_string(),
    ];

    FlowSimulation {
        total_duration_days: total,
        phases,
        resource_notes,
        risk_notes,
        checkpoints,
    }
}

fn phase(name: &str, days: u32, description: &str) -> FlowPhase {
    FlowPhase {
        name: name.to_string(),
        duration_days: days,
        description: description.to_string(),
    }
}

fn follow_up_questions(summary: Option<&crate::types::CaseSummary>) -> Vec<String> {
    let Some(summary) = summary else {
        return vec!["무엇을 확인해 드리면 될까요? 사건의 핵심 사실부터 알려주세요.".to_string()];
    };

    let missing: Vec<String> = summary
        .missing_details
        .iter()
        .map(|d| format!("{}을(를) 알려주실 수 있나요?", d))
        .collect();
    let merged = merge_dedup_capped(&[&summary.next_questions, &missing], MAX_FOLLOW_UPS);
    if merged.is_empty() {
        vec!["추가로 확인해야 할 사실이 있을까요?".to_string()]
    } else {
        merged
    }
}

fn compose_summary(
    signals: &[Signal],
    risk_score: u8,
    overall_risk: RiskLevel,
    urgency: Option<&str>,
) -> String {
    let high_count = signals
        .iter()
        .filter(|s| s.severity == Severity::High)
        .count();

    let risk_word = match overall_risk {
        RiskLevel::High => "high",
        RiskLevel::Medium => "medium",
        RiskLevel::Low => "low",
    };

    let mut summary = format!(
        "{} signal(s) detected ({} high). Risk {}/100, {} overall.",
        signals.len(),
        high_count,
        risk_score,
        risk_word
    );

    if let Some(top) = signals.iter().max_by(|a, b| {
        (a.severity, a.confidence)
            .partial_cmp(&(b.severity, b.confidence))
            .unwrap_or(std::cmp::Ordering::Equal)
    }) {
        summary.push_str(&format!(" Leading signal: {}.", top.title));
    }

    if let Some(urgency) = urgency {
        summary.push_str(&format!(" Client urgency: {}.", urgency));
    }

    summary
}
