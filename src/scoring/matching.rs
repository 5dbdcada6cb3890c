//! Candidate-to-case matching.
//!
//! Builds a normalized token set from the case context and detected risk
//! signals, scores each candidate on keyword overlap, rating, resolution
//! rate, and experience, weights by overall case risk, and keeps the top
//! five with a rank bonus. Every numeric component surfaces as a
//! human-readable alignment factor.

use serde::{Deserialize, Serialize};

use crate::detect::Signal;
use crate::scoring::{risk_weight, RiskLevel};
use crate::util::{clamp_f64, tokenize};

/// Component-score frame. These constants are the matching contract and are
/// reproduced in tests.
const KEYWORD_POINTS_PER_TOKEN: f64 = 8.0;
const KEYWORD_SCORE_CAP: f64 = 60.0;
const RATING_MULTIPLIER: f64 = 8.0;
const SUCCESS_MULTIPLIER: f64 = 0.45;
const EXPERIENCE_MULTIPLIER: f64 = 2.2;
const EXPERIENCE_YEAR_CAP: f64 = 30.0;
const RAW_SCORE_MIN: f64 = 20.0;
const RAW_SCORE_MAX: f64 = 100.0;
const FINAL_SCORE_MIN: f64 = 25.0;
const FINAL_SCORE_MAX: f64 = 100.0;
const PROBABILITY_MIN: f64 = 0.35;
const PROBABILITY_MAX: f64 = 0.96;
const CONFIDENCE_BASE: f64 = 0.45;
const CONFIDENCE_SPAN: f64 = 0.45;
const CONFIDENCE_MIN: f64 = 0.55;
const CONFIDENCE_MAX: f64 = 0.95;
const TOP_N: usize = 5;

/// Extra match vocabulary per detected signal id. A detected threat should
/// also pull in candidates who advertise protection work, not only the
/// literal word.
const SIGNAL_SYNONYMS: &[(&str, &[&str])] = &[
    ("violence-threat", &["threat", "protection", "협박", "신변보호"]),
    ("legal-deadline", &["legal", "litigation", "소송", "법률"]),
    ("stalking-pattern", &["stalking", "protection", "스토킹"]),
    ("self-harm-risk", &["crisis", "위기"]),
    ("financial-fraud", &["fraud", "financial", "사기", "자산"]),
    ("privacy-exposure", &["privacy", "digital", "유출", "디지털"]),
    ("evidence-destruction", &["forensics", "evidence", "증거"]),
    ("missing-contact", &["missing", "trace", "실종", "소재파악"]),
    ("repeated-harassment", &["harassment", "protection", "괴롭힘"]),
    ("debt-evasion", &["debt", "asset", "채권", "자산추적"]),
];

/// Read-only provider profile supplied by the calling system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_average: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_area: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

/// Case-side inputs for one matching pass.
#[derive(Debug, Clone, Default)]
pub struct MatchContext {
    pub title: Option<String>,
    pub case_type: Option<String>,
    pub primary_intent: Option<String>,
    pub objective: Option<String>,
    pub urgency: Option<String>,
    pub key_facts: Vec<String>,
    pub recommended_documents: Vec<String>,
    pub keywords: Vec<String>,
    pub region: Option<String>,
    pub signals: Vec<Signal>,
    pub overall_risk: RiskLevel,
}

impl MatchContext {
    /// Build a context from the intake case summary plus the current
    /// detection state.
    pub fn from_summary(
        summary: &crate::types::CaseSummary,
        keywords: Vec<String>,
        region: Option<String>,
        signals: Vec<Signal>,
        overall_risk: RiskLevel,
    ) -> Self {
        Self {
            title: summary.title.clone(),
            case_type: summary.case_type.clone(),
            primary_intent: summary.primary_intent.clone(),
            objective: summary.objective.clone(),
            urgency: summary.urgency.clone(),
            key_facts: summary.key_facts.clone(),
            recommended_documents: summary.recommended_documents.clone(),
            keywords,
            region,
            signals,
            overall_risk,
        }
    }
}

/// One ranked match. Computed fresh per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub candidate_id: String,
    pub match_score: f64,
    pub success_probability: f64,
    pub confidence: f64,
    pub alignment_factors: Vec<String>,
    pub rank_bonus: f64,
}

/// Rank candidates against the case. Returns at most five results, best
/// first, with the rank bonus already applied.
pub fn match_candidates(candidates: &[CandidateProfile], ctx: &MatchContext) -> Vec<MatchResult> {
    let case_tokens = build_case_tokens(ctx);
    let weight = risk_weight(ctx.overall_risk);

    let mut scored: Vec<(f64, MatchResult)> = candidates
        .iter()
        .map(|candidate| score_candidate(candidate, &case_tokens, weight, ctx))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.1.candidate_id.cmp(&b.1.candidate_id))
    });
    scored.truncate(TOP_N);

    scored
        .into_iter()
        .enumerate()
        .map(|(rank, (raw, mut result))| {
            let bonus = (6.0 - 2.0 * rank as f64).max(0.0);
            result.rank_bonus = bonus;
            result.match_score = clamp_f64(raw + bonus, FINAL_SCORE_MIN, FINAL_SCORE_MAX);
            result
        })
        .collect()
}

/// Normalized, de-duplicated token set for the case: summary fields,
/// keywords, and detected signal titles plus their synonym vocabulary.
fn build_case_tokens(ctx: &MatchContext) -> Vec<String> {
    let mut corpus = String::new();
    let mut push = |part: &str| {
        corpus.push_str(part);
        corpus.push(' ');
    };

    for field in [
        &ctx.title,
        &ctx.case_type,
        &ctx.primary_intent,
        &ctx.objective,
        &ctx.urgency,
    ]
    .into_iter()
    .flatten()
    {
        push(field);
    }
    for fact in &ctx.key_facts {
        push(fact);
    }
    for doc in &ctx.recommended_documents {
        push(doc);
    }
    for keyword in &ctx.keywords {
        push(keyword);
    }
    for signal in &ctx.signals {
        push(&signal.title);
        if let Some((_, synonyms)) = SIGNAL_SYNONYMS.iter().find(|(id, _)| *id == signal.id) {
            for synonym in *synonyms {
                push(synonym);
            }
        }
    }

    tokenize(&corpus)
}

fn score_candidate(
    candidate: &CandidateProfile,
    case_tokens: &[String],
    weight: f64,
    ctx: &MatchContext,
) -> (f64, MatchResult) {
    let mut factors = Vec::new();

    // Keyword overlap against the candidate's advertised profile.
    let profile_text = format!(
        "{} {}",
        candidate.specialties.join(" "),
        candidate.service_area.as_deref().unwrap_or("")
    );
    let profile_tokens = tokenize(&profile_text);
    let matched: Vec<&String> = case_tokens
        .iter()
        .filter(|t| profile_tokens.contains(*t))
        .collect();
    let keyword_score = clamp_f64(
        matched.len() as f64 * KEYWORD_POINTS_PER_TOKEN,
        0.0,
        KEYWORD_SCORE_CAP,
    );
    if !matched.is_empty() {
        let shown: Vec<&str> = matched.iter().take(3).map(|s| s.as_str()).collect();
        factors.push(format!("covers {}", shown.join(", ")));
    }

    let rating_score = match candidate.rating_average {
        Some(rating) => {
            factors.push(format!("rated {:.1}/5", rating));
            rating * RATING_MULTIPLIER
        }
        None => 0.0,
    };

    let success_score = match candidate.success_rate {
        Some(rate) => {
            factors.push(format!("{:.0}% of past cases resolved", rate));
            rate * SUCCESS_MULTIPLIER
        }
        None => 0.0,
    };

    let experience = candidate.experience_years.unwrap_or(0.0);
    let capped_years = clamp_f64(experience, 0.0, EXPERIENCE_YEAR_CAP);
    let experience_score = capped_years * EXPERIENCE_MULTIPLIER;
    if experience > 0.0 {
        factors.push(format!("{:.0} years in the field", capped_years));
    }

    if let (Some(region), Some(area)) = (ctx.region.as_deref(), candidate.service_area.as_deref()) {
        let region_lower = region.to_lowercase();
        let area_lower = area.to_lowercase();
        if area_lower.contains(&region_lower) || region_lower.contains(&area_lower) {
            factors.push(format!("serves {}", region));
        }
    }

    let raw_score = clamp_f64(
        (keyword_score + rating_score + success_score + experience_score) * weight,
        RAW_SCORE_MIN,
        RAW_SCORE_MAX,
    );

    // Probability blends the same components on normalized scales.
    let normalized_rating = candidate.rating_average.unwrap_or(0.0) / 5.0;
    let normalized_success = candidate.success_rate.unwrap_or(0.0) / 100.0;
    let normalized_experience = capped_years / EXPERIENCE_YEAR_CAP;
    let normalized_keywords = keyword_score / KEYWORD_SCORE_CAP;
    let success_probability = clamp_f64(
        (0.32 * normalized_rating
            + 0.28 * normalized_success
            + 0.22 * normalized_experience
            + 0.18 * normalized_keywords)
            * weight,
        PROBABILITY_MIN,
        PROBABILITY_MAX,
    );

    // Confidence grows with profile completeness.
    let present = [
        candidate.rating_average.is_some(),
        candidate.success_rate.is_some(),
        !candidate.specialties.is_empty(),
        experience > 0.0,
    ]
    .iter()
    .filter(|p| **p)
    .count();
    let confidence = clamp_f64(
        CONFIDENCE_BASE + CONFIDENCE_SPAN * (present as f64 / 4.0),
        CONFIDENCE_MIN,
        CONFIDENCE_MAX,
    );

    // Explainability floor: any numeric signal must leave a trace.
    if factors.is_empty() && (rating_score > 0.0 || success_score > 0.0 || experience_score > 0.0) {
        factors.push("profile data on record".to_string());
    }

    (
        raw_score,
        MatchResult {
            candidate_id: candidate.id.clone(),
            match_score: raw_score,
            success_probability,
            confidence,
            alignment_factors: factors,
            rank_bonus: 0.0,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Severity;

    fn candidate(id: &str) -> CandidateProfile {
        CandidateProfile {
            id: id.to_string(),
            rating_average: None,
            success_rate: None,
            experience_years: None,
            service_area: None,
            specialties: Vec::new(),
            contact: None,
        }
    }

    fn signal(id: &str, title: &str) -> Signal {
        Signal {
            id: id.to_string(),
            title: title.to_string(),
            severity: Severity::High,
            confidence: 0.75,
            evidence: String::new(),
            guidance: String::new(),
        }
    }

    #[test]
    fn test_strong_candidate_outranks_weak() {
        let strong = CandidateProfile {
            rating_average: Some(5.0),
            success_rate: Some(90.0),
            experience_years: Some(10.0),
            specialties: vec!["stalking protection".to_string()],
            ..candidate("strong")
        };
        let weak = CandidateProfile {
            rating_average: Some(3.0),
            success_rate: Some(40.0),
            experience_years: Some(1.0),
            ..candidate("weak")
        };

        let ctx = MatchContext {
            keywords: vec!["stalking".to_string()],
            ..Default::default()
        };
        let results = match_candidates(&[weak, strong], &ctx);
        assert_eq!(results[0].candidate_id, "strong");
        assert!(results[0].match_score > results[1].match_score);
    }

    #[test]
    fn test_success_rate_monotonicity() {
        let lower = CandidateProfile {
            rating_average: Some(4.0),
            success_rate: Some(50.0),
            experience_years: Some(5.0),
            ..candidate("lower")
        };
        let higher = CandidateProfile {
            success_rate: Some(80.0),
            ..lower.clone()
        };
        let higher = CandidateProfile {
            id: "higher".to_string(),
            ..higher
        };

        let results = match_candidates(&[lower, higher], &MatchContext::default());
        let lower_score = results
            .iter()
            .find(|r| r.candidate_id == "lower")
            .unwrap()
            .match_score;
        let higher_score = results
            .iter()
            .find(|r| r.candidate_id == "higher")
            .unwrap()
            .match_score;
        assert!(higher_score >= lower_score);
    }

    #[test]
    fn test_top_five_cap() {
        let candidates: Vec<CandidateProfile> = (0..9)
            .map(|i| CandidateProfile {
                rating_average: Some(3.0 + 0.2 * i as f64),
                ..candidate(&format!("c{}", i))
            })
            .collect();
        let results = match_candidates(&candidates, &MatchContext::default());
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn test_rank_bonus_exact_ladder() {
        let candidates: Vec<CandidateProfile> = (0..5)
            .map(|i| CandidateProfile {
                rating_average: Some(5.0 - i as f64 * 0.5),
                success_rate: Some(80.0 - i as f64 * 10.0),
                experience_years: Some(10.0),
                ..candidate(&format!("c{}", i))
            })
            .collect();
        let results = match_candidates(&candidates, &MatchContext::default());
        assert_eq!(results[0].rank_bonus, 6.0);
        assert_eq!(results[1].rank_bonus, 4.0);
        assert_eq!(results[2].rank_bonus, 2.0);
        assert_eq!(results[3].rank_bonus, 0.0);
        assert_eq!(results[4].rank_bonus, 0.0);
    }

    #[test]
    fn test_rank_bonus_added_to_score() {
        let top = CandidateProfile {
            rating_average: Some(4.0),
            success_rate: Some(70.0),
            experience_years: Some(8.0),
            ..candidate("top")
        };
        let results = match_candidates(&[top], &MatchContext::default());
        // raw = (32 + 31.5 + 17.6) × 0.95 = 77.045; +6 rank bonus
        let raw = (4.0 * 8.0 + 70.0 * 0.45 + 8.0 * 2.2) * 0.95;
        assert!((results[0].match_score - (raw + 6.0)).abs() < 1e-9);
    }

    #[test]
    fn test_bonus_preserves_ordering() {
        let candidates: Vec<CandidateProfile> = (0..6)
            .map(|i| CandidateProfile {
                rating_average: Some(2.5 + 0.4 * i as f64),
                success_rate: Some(50.0),
                ..candidate(&format!("c{}", i))
            })
            .collect();
        let results = match_candidates(&candidates, &MatchContext::default());
        assert!(results
            .windows(2)
            .all(|w| w[0].match_score >= w[1].match_score));
    }

    #[test]
    fn test_risk_weight_raises_scores() {
        let c = CandidateProfile {
            rating_average: Some(4.0),
            success_rate: Some(60.0),
            experience_years: Some(5.0),
            ..candidate("c")
        };
        let low_ctx = MatchContext::default();
        let high_ctx = MatchContext {
            overall_risk: RiskLevel::High,
            ..Default::default()
        };
        let low = match_candidates(std::slice::from_ref(&c), &low_ctx)[0].match_score;
        let high = match_candidates(&[c], &high_ctx)[0].match_score;
        assert!(high > low);
    }

    #[test]
    fn test_bounds_always_hold() {
        let empty = candidate("empty");
        let maxed = CandidateProfile {
            rating_average: Some(5.0),
            success_rate: Some(100.0),
            experience_years: Some(45.0),
            specialties: vec!["everything".to_string()],
            ..candidate("maxed")
        };
        let ctx = MatchContext {
            keywords: vec!["everything".to_string()],
            overall_risk: RiskLevel::High,
            ..Default::default()
        };
        for result in match_candidates(&[empty, maxed], &ctx) {
            assert!((25.0..=100.0).contains(&result.match_score));
            assert!((0.35..=0.96).contains(&result.success_probability));
            assert!((0.55..=0.95).contains(&result.confidence));
        }
    }

    #[test]
    fn test_signal_synonyms_feed_tokens() {
        let protective = CandidateProfile {
            specialties: vec!["personal protection detail".to_string()],
            rating_average: Some(4.0),
            ..candidate("protective")
        };
        let generic = CandidateProfile {
            rating_average: Some(4.0),
            ..candidate("generic")
        };

        let ctx = MatchContext {
            signals: vec![signal("violence-threat", "Violence threat")],
            ..Default::default()
        };
        let results = match_candidates(&[generic, protective], &ctx);
        assert_eq!(results[0].candidate_id, "protective");
        assert!(results[0]
            .alignment_factors
            .iter()
            .any(|f| f.contains("protection")));
    }

    #[test]
    fn test_numeric_signal_always_explained() {
        let only_rating = CandidateProfile {
            rating_average: Some(4.5),
            ..candidate("only-rating")
        };
        let results = match_candidates(&[only_rating], &MatchContext::default());
        assert!(!results[0].alignment_factors.is_empty());
    }

    #[test]
    fn test_service_area_fit_factor() {
        let local = CandidateProfile {
            rating_average: Some(4.0),
            service_area: Some("Seoul Gangnam".to_string()),
            ..candidate("local")
        };
        let ctx = MatchContext {
            region: Some("seoul".to_string()),
            ..Default::default()
        };
        let results = match_candidates(&[local], &ctx);
        assert!(results[0]
            .alignment_factors
            .iter()
            .any(|f| f.contains("serves")));
    }
}
