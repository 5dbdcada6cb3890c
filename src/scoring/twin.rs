//! Case risk / success estimation ("digital twin").
//!
//! Deterministic: a base score plus fixed integer deltas per factor value,
//! then per-category scenario-variable deltas through the registry, clamped
//! to [8, 96]. The delta constants are the engine's contract: downstream
//! expectations and tests reproduce them exactly, so they are not tuned
//! casually.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::scenario::{ScenarioVariableRegistry, ValueMap};
use crate::scoring::ScoreAccumulator;
use crate::util::clamp_f64;

/// Scoring frame.
const BASE_SCORE: f64 = 62.0;
const SCORE_MIN: f64 = 8.0;
const SCORE_MAX: f64 = 96.0;

/// Confidence label thresholds on the final score.
const HIGH_CONFIDENCE_SCORE: f64 = 75.0;
const MEDIUM_CONFIDENCE_SCORE: f64 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLabel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamComposition {
    Solo,
    Pair,
    Squad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shift {
    Day,
    Night,
    Dawn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOccupation {
    OfficeWorker,
    SelfEmployed,
    ShiftWorker,
    Student,
    Unemployed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommutePattern {
    Regular,
    Irregular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weather {
    Clear,
    Rain,
    Snow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationDensity {
    UrbanDense,
    Suburban,
    Rural,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetTier {
    Low,
    Standard,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayKind {
    Weekday,
    Weekend,
}

/// Fixed case facts feeding the estimator. Absent fields contribute
/// nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedFactors {
    /// Scenario category id; unlocks the per-category variable heuristics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<TeamComposition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_occupation: Option<TargetOccupation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commute_pattern: Option<CommutePattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_density: Option<LocationDensity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escort_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<BudgetTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<DayKind>,
}

/// Deterministic risk estimate, optionally blended with an external result
/// downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeuristicAnalysis {
    pub id: String,
    pub generated_at: DateTime<Utc>,
    /// Success estimate on a 0–100 scale, clamped to [8, 96].
    pub success_rate: u8,
    pub confidence_label: ConfidenceLabel,
    pub key_factors: Vec<String>,
    pub risk_alerts: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub timeline: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

/// Estimate case success from fixed factors plus sanitized scenario
/// variables. `variables` defaults to the category's defaults when absent.
pub fn estimate(
    factors: &FixedFactors,
    registry: &ScenarioVariableRegistry,
    variables: Option<&ValueMap>,
) -> Result<HeuristicAnalysis, EngineError> {
    let mut acc = ScoreAccumulator::new(BASE_SCORE);

    apply_fixed_factors(factors, &mut acc);

    if let Some(category) = factors.category.as_deref() {
        let defaults;
        let values = match variables {
            Some(v) => v,
            None => {
                defaults = registry.defaults(category)?;
                &defaults
            }
        };
        registry.apply_heuristic(category, values, &mut acc)?;
    }

    let score = clamp_f64(acc.score, SCORE_MIN, SCORE_MAX);
    let confidence_label = if score >= HIGH_CONFIDENCE_SCORE {
        ConfidenceLabel::High
    } else if score >= MEDIUM_CONFIDENCE_SCORE {
        ConfidenceLabel::Medium
    } else {
        ConfidenceLabel::Low
    };

    Ok(HeuristicAnalysis {
        id: format!("est-{}", Uuid::new_v4()),
        generated_at: Utc::now(),
        success_rate: score.round() as u8,
        confidence_label,
        key_factors: defaulted(acc.key_factors, "Standard operating assumptions apply."),
        risk_alerts: defaulted(acc.risk_alerts, "No specific risk factors identified yet."),
        recommended_actions: defaulted(
            acc.recommended_actions,
            "Proceed with the standard intake checklist.",
        ),
        timeline: timeline_for(factors.category.as_deref()),
        rationale: None,
    })
}

/// Never hand back an empty explanation list.
fn defaulted(list: Vec<String>, fallback: &str) -> Vec<String> {
    if list.is_empty() {
        vec![fallback.to_string()]
    } else {
        list
    }
}

fn apply_fixed_factors(factors: &FixedFactors, acc: &mut ScoreAccumulator) {
    match factors.team {
        Some(TeamComposition::Solo) => {
            acc.debit(7.0, "Solo coverage leaves no relief and no second witness.")
        }
        Some(TeamComposition::Pair) => acc.credit(4.0, "Paired team covers handoffs and breaks."),
        Some(TeamComposition::Squad) => {
            acc.credit(8.0, "Full squad allows continuous rotation without exposure.")
        }
        None => {}
    }

    match factors.vehicle_available {
        Some(true) => acc.credit(6.0, "Vehicle on hand keeps mobile contact."),
        Some(false) => acc.debit(5.0, "No vehicle; mobile phases depend on public transit."),
        None => {}
    }

    match factors.shift {
        Some(Shift::Day) => acc.credit(3.0, "Daylight work keeps identification reliable."),
        Some(Shift::Night) => acc.debit(6.0, "Night shift cuts visibility and staffing options."),
        Some(Shift::Dawn) => acc.debit(3.0, "Dawn window is short and hard to staff."),
        None => {}
    }

    match factors.target_occupation {
        Some(TargetOccupation::OfficeWorker) => {
            acc.credit(5.0, "Office schedule anchors the subject's day.")
        }
        Some(TargetOccupation::SelfEmployed) => {
            acc.debit(4.0, "Self-employed subject sets their own hours.")
        }
        Some(TargetOccupation::ShiftWorker) => {
            acc.debit(6.0, "Rotating shifts break every routine assumption.")
        }
        Some(TargetOccupation::Student) => acc.credit(2.0, "Class timetable gives fixed anchors."),
        Some(TargetOccupation::Unemployed) => {
            acc.debit(7.0, "No employment anchor; movements are unpredictable.")
        }
        None => {}
    }

    match factors.commute_pattern {
        Some(CommutePattern::Regular) => {
            acc.credit(6.0, "Regular commute makes contact windows predictable.")
        }
        Some(CommutePattern::Irregular) => {
            acc.debit(6.0, "Irregular movement forces wider coverage windows.")
        }
        None => {}
    }

    match factors.weather {
        Some(Weather::Clear) => acc.credit(2.0, "Clear forecast for the engagement window."),
        Some(Weather::Rain) => acc.debit(4.0, "Rain reduces visibility and camera quality."),
        Some(Weather::Snow) => acc.debit(7.0, "Snow slows movement and leaves the team exposed."),
        None => {}
    }

    match factors.location_density {
        Some(LocationDensity::UrbanDense) => {
            acc.credit(4.0, "Dense urban area lets operatives blend in.")
        }
        Some(LocationDensity::Suburban) => {}
        Some(LocationDensity::Rural) => {
            acc.debit(8.0, "Rural setting: an unfamiliar face gets noticed fast.")
        }
        None => {}
    }

    match factors.escort_size {
        Some(0) => acc.credit(5.0, "Subject moves unaccompanied."),
        Some(1) => acc.debit(2.0, "One companion doubles the eyes to avoid."),
        Some(_) => acc.debit(6.0, "Escort group makes close observation risky."),
        None => {}
    }

    match factors.budget {
        Some(BudgetTier::Low) => {
            acc.debit(5.0, "Budget limits rotations and equipment.");
        }
        Some(BudgetTier::Standard) => {}
        Some(BudgetTier::Premium) => {
            acc.credit(6.0, "Premium budget covers full rotations and equipment.")
        }
        None => {}
    }

    match factors.day_of_week {
        Some(DayKind::Weekday) => acc.credit(3.0, "Weekday routine is the most repeatable."),
        Some(DayKind::Weekend) => acc.debit(2.0, "Weekend movement varies widely."),
        None => {}
    }
}

/// Coarse phase timeline per scenario category.
fn timeline_for(category: Option<&str>) -> Vec<String> {
    match category {
        Some("surveillance") => vec![
            "Day 1-2: Route confirmation and baseline pattern".to_string(),
            "Day 3-5: Active tailing on confirmed windows".to_string(),
            "Day 6-7: Evidence package and client review".to_string(),
        ],
        Some("stakeout") => vec![
            "Day 1: Position setup and camera installation".to_string(),
            "Day 2-5: Rotating observation shifts".to_string(),
            "Day 6: Footage review and report draft".to_string(),
        ],
        Some("asset-trace") => vec![
            "Week 1: Registry and records sweep".to_string(),
            "Week 2-3: Entity mapping and transfer tracing".to_string(),
            "Week 4: Findings brief with counsel".to_string(),
        ],
        Some("background-check") => vec![
            "Day 1-2: Public registry verification".to_string(),
            "Day 3-4: Reference interviews".to_string(),
            "Day 5: Consolidated report".to_string(),
        ],
        _ => vec![
            "Phase 1: Intake and fact confirmation".to_string(),
            "Phase 2: Field work".to_string(),
            "Phase 3: Report and handoff".to_string(),
        ],
    }
}
