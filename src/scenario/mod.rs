//! Typed, per-category scenario variables.
//!
//! Pure configuration-and-coercion layer: variable definitions are declared
//! per scenario category, raw values crossing a process boundary are
//! sanitized against the definitions (never against the raw map's keys, so
//! unknown variables cannot be injected), and the per-category heuristic
//! functions are looked up here. No scoring logic lives in this module.

pub mod categories;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::scoring::ScoreAccumulator;

/// Strings coerced to `true` for boolean variables; the complement set
/// coerces to `false`, anything else falls back to the default.
const TRUTHY: &[&str] = &["true", "1", "yes", "y", "on"];
const FALSY: &[&str] = &["false", "0", "no", "n", "off"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    Select,
    Boolean,
    Number,
}

/// A typed variable value. Untagged so JSON input round-trips naturally
/// (`true`, `3.5`, `"full"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariableValue {
    Bool(bool),
    Num(f64),
    Select(String),
}

impl VariableValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariableValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            VariableValue::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_select(&self) -> Option<&str> {
        match self {
            VariableValue::Select(s) => Some(s),
            _ => None,
        }
    }
}

/// Static definition of one scenario variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    pub id: String,
    pub label: String,
    pub description: String,
    pub var_type: VariableType,
    pub default: VariableValue,
    /// Select variables only.
    #[serde(default)]
    pub options: Vec<String>,
    /// Number variables only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

/// Sanitized variable values, keyed by variable id.
pub type ValueMap = BTreeMap<String, VariableValue>;

/// Per-category scoring heuristic: applies variable-driven deltas to the
/// shared accumulator, each paired with its explanation.
pub type CategoryHeuristic = fn(&ValueMap, &mut ScoreAccumulator);

/// One registered scenario category: definitions plus its heuristic.
pub struct CategoryEntry {
    pub id: String,
    pub label: String,
    pub definitions: Vec<VariableDefinition>,
    pub heuristic: CategoryHeuristic,
}

/// Registry of scenario categories. Built once at startup; registration
/// failures are configuration errors.
pub struct ScenarioVariableRegistry {
    categories: HashMap<String, CategoryEntry>,
}

impl ScenarioVariableRegistry {
    pub fn new() -> Self {
        Self {
            categories: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the four built-in categories.
    pub fn builtin() -> Result<Self, EngineError> {
        let mut registry = Self::new();
        for entry in categories::builtin_categories() {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Register a category. Validates every definition; the first invalid
    /// one fails the whole registration.
    pub fn register(&mut self, entry: CategoryEntry) -> Result<(), EngineError> {
        if self.categories.contains_key(&entry.id) {
            return Err(EngineError::Configuration(format!(
                "scenario category '{}' registered twice",
                entry.id
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for def in &entry.definitions {
            if !seen.insert(def.id.clone()) {
                return Err(EngineError::InvalidVariableDefinition {
                    variable_id: def.id.clone(),
                    message: "duplicate variable id".to_string(),
                });
            }
            validate_definition(def)?;
        }

        self.categories.insert(entry.id.clone(), entry);
        Ok(())
    }

    pub fn category_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.categories.keys().map(|s| s.as_str()).collect();
        ids.sort();
        ids
    }

    pub fn definitions(&self, category: &str) -> Result<&[VariableDefinition], EngineError> {
        Ok(&self.entry(category)?.definitions)
    }

    /// Default value map for a category: exactly the definition key set.
    pub fn defaults(&self, category: &str) -> Result<ValueMap, EngineError> {
        let entry = self.entry(category)?;
        Ok(entry
            .definitions
            .iter()
            .map(|def| (def.id.clone(), def.default.clone()))
            .collect())
    }

    /// Sanitize raw values against the category's definitions.
    ///
    /// Iterates the definitions, never the raw keys: unknown keys are
    /// dropped, missing keys take the default, out-of-range numbers are
    /// clamped, unknown select options fall back to the default. Idempotent.
    pub fn sanitize(
        &self,
        category: &str,
        raw: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<ValueMap, EngineError> {
        let entry = self.entry(category)?;
        let mut values = ValueMap::new();
        for def in &entry.definitions {
            let value = match raw.get(&def.id) {
                Some(raw_value) => coerce(def, raw_value),
                None => def.default.clone(),
            };
            values.insert(def.id.clone(), value);
        }
        Ok(values)
    }

    /// Render sanitized values as prompt lines for the external generator.
    pub fn format_for_prompt(
        &self,
        category: &str,
        values: &ValueMap,
    ) -> Result<Vec<String>, EngineError> {
        let entry = self.entry(category)?;
        Ok(entry
            .definitions
            .iter()
            .filter_map(|def| {
                let value = values.get(&def.id)?;
                Some(format!("{}: {}", def.label, render_value(value)))
            })
            .collect())
    }

    /// Apply the category's heuristic to the accumulator.
    pub fn apply_heuristic(
        &self,
        category: &str,
        values: &ValueMap,
        acc: &mut ScoreAccumulator,
    ) -> Result<(), EngineError> {
        let entry = self.entry(category)?;
        (entry.heuristic)(values, acc);
        Ok(())
    }

    fn entry(&self, category: &str) -> Result<&CategoryEntry, EngineError> {
        self.categories
            .get(category)
            .ok_or_else(|| EngineError::UnknownCategory(category.to_string()))
    }
}

impl Default for ScenarioVariableRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_definition(def: &VariableDefinition) -> Result<(), EngineError> {
    let invalid = |message: &str| EngineError::InvalidVariableDefinition {
        variable_id: def.id.clone(),
        message: message.to_string(),
    };

    match def.var_type {
        VariableType::Select => {
            if def.options.is_empty() {
                return Err(invalid("select variable has no options"));
            }
            match &def.default {
                VariableValue::Select(d) if def.options.contains(d) => Ok(()),
                _ => Err(invalid("select default is not one of the options")),
            }
        }
        VariableType::Boolean => match def.default {
            VariableValue::Bool(_) => Ok(()),
            _ => Err(invalid("boolean default has the wrong type")),
        },
        VariableType::Number => {
            let (min, max) = match (def.min, def.max) {
                (Some(min), Some(max)) if min <= max => (min, max),
                _ => return Err(invalid("number variable needs min <= max")),
            };
            match def.default {
                VariableValue::Num(d) if d >= min && d <= max => Ok(()),
                _ => Err(invalid("number default is out of range")),
            }
        }
    }
}

/// Coerce one raw JSON value against its definition.
fn coerce(def: &VariableDefinition, raw: &serde_json::Value) -> VariableValue {
    match def.var_type {
        VariableType::Boolean => coerce_bool(raw)
            .map(VariableValue::Bool)
            .unwrap_or_else(|| def.default.clone()),
        VariableType::Number => {
            let parsed = match raw {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match parsed {
                Some(n) if n.is_finite() => {
                    let min = def.min.unwrap_or(f64::MIN);
                    let max = def.max.unwrap_or(f64::MAX);
                    VariableValue::Num(n.max(min).min(max))
                }
                _ => def.default.clone(),
            }
        }
        VariableType::Select => match raw {
            serde_json::Value::String(s) => {
                let candidate = s.trim().to_lowercase();
                if def.options.iter().any(|o| *o == candidate) {
                    VariableValue::Select(candidate)
                } else {
                    def.default.clone()
                }
            }
            _ => def.default.clone(),
        },
    }
}

fn coerce_bool(raw: &serde_json::Value) -> Option<bool> {
    match raw {
        serde_json::Value::Bool(b) => Some(*b),
        serde_json::Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        serde_json::Value::String(s) => {
            let lowered = s.trim().to_lowercase();
            if TRUTHY.contains(&lowered.as_str()) {
                Some(true)
            } else if FALSY.contains(&lowered.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn render_value(value: &VariableValue) -> String {
    match value {
        VariableValue::Bool(true) => "yes".to_string(),
        VariableValue::Bool(false) => "no".to_string(),
        VariableValue::Num(n) if n.fract() == 0.0 => format!("{}", *n as i64),
        VariableValue::Num(n) => format!("{:.2}", n),
        VariableValue::Select(s) => s.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().expect("object").clone()
    }

    #[test]
    fn test_builtin_registers_four_categories() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        assert_eq!(
            registry.category_ids(),
            vec!["asset-trace", "background-check", "stakeout", "surveillance"]
        );
    }

    #[test]
    fn test_defaults_key_set_equals_definitions() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let defaults = registry.defaults("surveillance").expect("defaults");
        let definitions = registry.definitions("surveillance").expect("defs");
        assert_eq!(defaults.len(), definitions.len());
        for def in definitions {
            assert!(defaults.contains_key(&def.id));
        }
    }

    #[test]
    fn test_unknown_category_is_config_error() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let err = registry.defaults("divination").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_sanitize_drops_unknown_keys() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let values = registry
            .sanitize("surveillance", &raw(json!({"evil_injected_key": "x"})))
            .expect("sanitize");
        assert!(!values.contains_key("evil_injected_key"));
    }

    #[test]
    fn test_sanitize_truthy_strings() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let values = registry
            .sanitize("surveillance", &raw(json!({"targetVehicle": "yes"})))
            .expect("sanitize");
        assert_eq!(values.get("targetVehicle"), Some(&VariableValue::Bool(true)));

        let values = registry
            .sanitize("surveillance", &raw(json!({"targetVehicle": "0"})))
            .expect("sanitize");
        assert_eq!(values.get("targetVehicle"), Some(&VariableValue::Bool(false)));
    }

    #[test]
    fn test_sanitize_clamps_numbers() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let values = registry
            .sanitize("surveillance", &raw(json!({"operativeCount": 99})))
            .expect("sanitize");
        assert_eq!(values.get("operativeCount"), Some(&VariableValue::Num(4.0)));
    }

    #[test]
    fn test_sanitize_rejects_unknown_select_option() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let values = registry
            .sanitize(
                "surveillance",
                &raw(json!({"contactFrequency": "hourly-telepathy"})),
            )
            .expect("sanitize");
        assert_eq!(
            values.get("contactFrequency"),
            Some(&VariableValue::Select("weekly".to_string()))
        );
    }

    #[test]
    fn test_sanitize_idempotent() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let raw_input = raw(json!({
            "targetVehicle": "y",
            "operativeCount": "17",
            "durationDays": -3,
            "contactFrequency": "DAILY",
            "junk": {"nested": true}
        }));

        let once = registry.sanitize("surveillance", &raw_input).expect("once");

        // Round-trip the sanitized map through JSON and sanitize again.
        let as_json = serde_json::to_value(&once).expect("serialize");
        let twice = registry
            .sanitize("surveillance", &raw(as_json))
            .expect("twice");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_invalid_definition_rejected() {
        let mut registry = ScenarioVariableRegistry::new();
        let entry = CategoryEntry {
            id: "bad".to_string(),
            label: "Bad".to_string(),
            definitions: vec![VariableDefinition {
                id: "choice".to_string(),
                label: "Choice".to_string(),
                description: String::new(),
                var_type: VariableType::Select,
                default: VariableValue::Select("missing".to_string()),
                options: vec!["a".to_string(), "b".to_string()],
                min: None,
                max: None,
                step: None,
            }],
            heuristic: |_, _| {},
        };
        let err = registry.register(entry).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_format_for_prompt_lines() {
        let registry = ScenarioVariableRegistry::builtin().expect("builtin");
        let defaults = registry.defaults("stakeout").expect("defaults");
        let lines = registry
            .format_for_prompt("stakeout", &defaults)
            .expect("format");
        assert_eq!(lines.len(), defaults.len());
        assert!(lines.iter().all(|l| l.contains(": ")));
    }
}
