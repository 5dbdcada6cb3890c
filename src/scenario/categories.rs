//! Built-in scenario categories and their variable-driven heuristics.
//!
//! Four categories ship with the engine; the registry accepts more at
//! startup. Every heuristic delta is applied through the accumulator so it
//! always carries its explanation string.

use crate::scoring::ScoreAccumulator;

use super::{CategoryEntry, ValueMap, VariableDefinition, VariableType, VariableValue};

fn select(id: &str, label: &str, description: &str, options: &[&str], default: &str) -> VariableDefinition {
    VariableDefinition {
        id: id.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        var_type: VariableType::Select,
        default: VariableValue::Select(default.to_string()),
        options: options.iter().map(|s| s.to_string()).collect(),
        min: None,
        max: None,
        step: None,
    }
}

fn boolean(id: &str, label: &str, description: &str, default: bool) -> VariableDefinition {
    VariableDefinition {
        id: id.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        var_type: VariableType::Boolean,
        default: VariableValue::Bool(default),
        options: Vec::new(),
        min: None,
        max: None,
        step: None,
    }
}

fn number(
    id: &str,
    label: &str,
    description: &str,
    min: f64,
    max: f64,
    step: f64,
    default: f64,
) -> VariableDefinition {
    VariableDefinition {
        id: id.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        var_type: VariableType::Number,
        default: VariableValue::Num(default),
        options: Vec::new(),
        min: Some(min),
        max: Some(max),
        step: Some(step),
    }
}

fn get_bool(values: &ValueMap, id: &str) -> bool {
    values.get(id).and_then(|v| v.as_bool()).unwrap_or(false)
}

fn get_num(values: &ValueMap, id: &str) -> f64 {
    values.get(id).and_then(|v| v.as_num()).unwrap_or(0.0)
}

fn get_select<'a>(values: &'a ValueMap, id: &str) -> &'a str {
    values.get(id).and_then(|v| v.as_select()).unwrap_or("")
}

/// All built-in categories, ready for registration.
pub fn builtin_categories() -> Vec<CategoryEntry> {
    vec![
        surveillance_category(),
        stakeout_category(),
        asset_trace_category(),
        background_check_category(),
    ]
}

// ---------------------------------------------------------------------------
// surveillance: mobile tailing operations
// ---------------------------------------------------------------------------

fn surveillance_category() -> CategoryEntry {
    CategoryEntry {
        id: "surveillance".to_string(),
        label: "Mobile surveillance".to_string(),
        definitions: vec![
            boolean(
                "targetVehicle",
                "Target moves by car",
                "Whether the subject primarily travels by private vehicle.",
                false,
            ),
            number(
                "operativeCount",
                "Operatives on rotation",
                "Field operatives available for the tail.",
                1.0,
                4.0,
                1.0,
                2.0,
            ),
            number(
                "durationDays",
                "Engagement length (days)",
                "Planned length of the surveillance window.",
                1.0,
                30.0,
                1.0,
                7.0,
            ),
            select(
                "contactFrequency",
                "Expected sighting frequency",
                "How often the subject is expected at known locations.",
                &["daily", "weekly", "rare"],
                "weekly",
            ),
        ],
        heuristic: surveillance_heuristic,
    }
}

fn surveillance_heuristic(values: &ValueMap, acc: &mut ScoreAccumulator) {
    if get_bool(values, "targetVehicle") {
        acc.debit(6.0, "Target moves by car; a foot tail will lose contact at the first signal.");
        acc.recommend("Assign a vehicle team before the first rotation.");
    }

    let operatives = get_num(values, "operativeCount");
    if operatives >= 3.0 {
        acc.credit(7.0, "Three-operative rotation keeps the tail unnoticed on repeat routes.");
    } else if operatives <= 1.0 {
        acc.debit(8.0, "A single operative burns quickly on repeated routes.");
        acc.recommend("Add a second operative or shorten the daily window.");
    }

    let duration = get_num(values, "durationDays");
    if duration >= 14.0 {
        acc.debit(4.0, "Engagements past two weeks raise exposure risk.");
    } else if duration <= 3.0 {
        acc.credit(3.0, "Short engagement window keeps the operation focused.");
    }

    match get_select(values, "contactFrequency") {
        "daily" => acc.credit(5.0, "Daily sightings confirm the route pattern fast."),
        "rare" => acc.debit(5.0, "Sparse sightings slow pattern confirmation."),
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// stakeout: fixed-position observation
// ---------------------------------------------------------------------------

fn stakeout_category() -> CategoryEntry {
    CategoryEntry {
        id: "stakeout".to_string(),
        label: "Fixed stakeout".to_string(),
        definitions: vec![
            boolean(
                "indoorPosition",
                "Indoor observation post",
                "Whether an indoor vantage point is secured.",
                false,
            ),
            number(
                "rotationHours",
                "Shift rotation (hours)",
                "Hours before the watching operative rotates out.",
                2.0,
                12.0,
                1.0,
                6.0,
            ),
            select(
                "cameraCoverage",
                "Camera coverage",
                "Fixed camera coverage of the observed entrance(s).",
                &["none", "partial", "full"],
                "partial",
            ),
            boolean(
                "nightFocus",
                "Night-hours focus",
                "Whether the decisive activity is expected at night.",
                false,
            ),
        ],
        heuristic: stakeout_heuristic,
    }
}

fn stakeout_heuristic(values: &ValueMap, acc: &mut ScoreAccumulator) {
    if get_bool(values, "indoorPosition") {
        acc.credit(5.0, "Secured indoor post removes weather and loitering problems.");
    }

    let rotation = get_num(values, "rotationHours");
    if rotation <= 4.0 {
        acc.credit(4.0, "Short rotations keep observers sharp.");
    } else if rotation >= 10.0 {
        acc.debit(6.0, "Rotations past ten hours degrade identification accuracy.");
        acc.recommend("Split the watch into two shifts.");
    }

    match get_select(values, "cameraCoverage") {
        "full" => acc.credit(8.0, "Full camera coverage backs every visual identification."),
        "none" => {
            acc.debit(7.0, "No camera backup; contested identifications rest on testimony alone.");
            acc.recommend("Install at least one fixed camera angle before starting.");
        }
        _ => {}
    }

    if get_bool(values, "nightFocus") {
        acc.debit(3.0, "Night work halves positive-identification rates.");
    }
}

// ---------------------------------------------------------------------------
// asset-trace: locating concealed assets
// ---------------------------------------------------------------------------

fn asset_trace_category() -> CategoryEntry {
    CategoryEntry {
        id: "asset-trace".to_string(),
        label: "Asset trace".to_string(),
        definitions: vec![
            number(
                "corporateEntities",
                "Related corporate entities",
                "Shell or related companies already identified.",
                0.0,
                20.0,
                1.0,
                1.0,
            ),
            boolean(
                "offshoreSuspected",
                "Offshore holdings suspected",
                "Whether assets are believed to sit outside the jurisdiction.",
                false,
            ),
            select(
                "recordsAvailable",
                "Financial records on hand",
                "How much of the paper trail the client already holds.",
                &["none", "partial", "complete"],
                "partial",
            ),
            number(
                "claimAgeYears",
                "Claim age (years)",
                "Years since the debt or transfer in question.",
                0.0,
                10.0,
                0.5,
                1.0,
            ),
        ],
        heuristic: asset_trace_heuristic,
    }
}

fn asset_trace_heuristic(values: &ValueMap, acc: &mut ScoreAccumulator) {
    if get_bool(values, "offshoreSuspected") {
        acc.debit(10.0, "Offshore holdings put recovery outside direct reach.");
        acc.recommend("Engage a cross-border records specialist early.");
    }

    match get_select(values, "recordsAvailable") {
        "complete" => acc.credit(9.0, "A complete paper trail shortens the trace to verification work."),
        "none" => {
            acc.debit(8.0, "No records on hand; the trace starts from public registries only.");
            acc.recommend("Request bank and registry disclosures through counsel.");
        }
        _ => {}
    }

    if get_num(values, "corporateEntities") >= 5.0 {
        acc.debit(6.0, "Five or more related entities signal deliberate layering.");
    }

    let age = get_num(values, "claimAgeYears");
    if age >= 5.0 {
        acc.debit(5.0, "Claims older than five years lose document trails and witnesses.");
    } else if age <= 1.0 {
        acc.credit(4.0, "Fresh claim; transfers are still visible in recent records.");
    }
}

// ---------------------------------------------------------------------------
// background-check: subject verification
// ---------------------------------------------------------------------------

fn background_check_category() -> CategoryEntry {
    CategoryEntry {
        id: "background-check".to_string(),
        label: "Background check".to_string(),
        definitions: vec![
            select(
                "publicProfile",
                "Subject public profile",
                "How much of the subject's footprint is publicly visible.",
                &["minimal", "moderate", "extensive"],
                "moderate",
            ),
            number(
                "referenceCount",
                "Reachable references",
                "People who can be interviewed about the subject.",
                0.0,
                10.0,
                1.0,
                2.0,
            ),
            boolean(
                "employmentVerification",
                "Employment verifiable",
                "Whether current employment can be verified directly.",
                true,
            ),
            boolean(
                "crossRegion",
                "Cross-region history",
                "Whether the subject's history spans multiple regions.",
                false,
            ),
        ],
        heuristic: background_check_heuristic,
    }
}

fn background_check_heuristic(values: &ValueMap, acc: &mut ScoreAccumulator) {
    match get_select(values, "publicProfile") {
        "extensive" => acc.credit(8.0, "Extensive public footprint cross-checks most claims."),
        "minimal" => {
            acc.debit(6.0, "Minimal public footprint leaves claims hard to corroborate.");
            acc.recommend("Start from public registries before contacting references.");
        }
        _ => {}
    }

    let references = get_num(values, "referenceCount");
    if references >= 3.0 {
        acc.credit(5.0, "Three or more reachable references triangulate the history.");
    } else if references == 0.0 {
        acc.debit(4.0, "No reachable references; verification rests on documents alone.");
    }

    if get_bool(values, "employmentVerification") {
        acc.credit(4.0, "Employment is directly verifiable.");
    }

    if get_bool(values, "crossRegion") {
        acc.debit(5.0, "Cross-region history multiplies registry lookups and delays.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_definitions() {
        for entry in builtin_categories() {
            assert!(!entry.definitions.is_empty(), "{} has no variables", entry.id);
        }
    }

    #[test]
    fn test_surveillance_vehicle_penalty_explained() {
        let entry = surveillance_category();
        let mut values = ValueMap::new();
        values.insert("targetVehicle".to_string(), VariableValue::Bool(true));
        values.insert("operativeCount".to_string(), VariableValue::Num(2.0));
        values.insert("durationDays".to_string(), VariableValue::Num(7.0));
        values.insert(
            "contactFrequency".to_string(),
            VariableValue::Select("weekly".to_string()),
        );

        let mut acc = ScoreAccumulator::new(62.0);
        (entry.heuristic)(&values, &mut acc);
        assert!(acc.score < 62.0);
        assert!(!acc.risk_alerts.is_empty());
        assert!(!acc.recommended_actions.is_empty());
    }

    #[test]
    fn test_stakeout_full_coverage_credits() {
        let entry = stakeout_category();
        let mut values = ValueMap::new();
        values.insert("indoorPosition".to_string(), VariableValue::Bool(false));
        values.insert("rotationHours".to_string(), VariableValue::Num(6.0));
        values.insert(
            "cameraCoverage".to_string(),
            VariableValue::Select("full".to_string()),
        );
        values.insert("nightFocus".to_string(), VariableValue::Bool(false));

        let mut acc = ScoreAccumulator::new(62.0);
        (entry.heuristic)(&values, &mut acc);
        assert!((acc.score - 70.0).abs() < 1e-9);
        assert_eq!(acc.key_factors.len(), 1);
    }

    #[test]
    fn test_asset_trace_offshore_recommends_specialist() {
        let entry = asset_trace_category();
        let mut values = ValueMap::new();
        values.insert("offshoreSuspected".to_string(), VariableValue::Bool(true));
        values.insert("corporateEntities".to_string(), VariableValue::Num(1.0));
        values.insert(
            "recordsAvailable".to_string(),
            VariableValue::Select("partial".to_string()),
        );
        values.insert("claimAgeYears".to_string(), VariableValue::Num(2.0));

        let mut acc = ScoreAccumulator::new(62.0);
        (entry.heuristic)(&values, &mut acc);
        assert!(acc
            .recommended_actions
            .iter()
            .any(|a| a.contains("cross-border")));
    }
}
