//! External generator seam.
//!
//! One dyn-compatible async trait with an HTTP implementation. The model is
//! asked for a JSON object; the response is free text, so the parser walks
//! brace depth to pull the first complete object out and validates it
//! against [`ExternalAnalysis`]. Every failure shape (transport, empty
//! output, schema mismatch) surfaces as a [`GeneratorError`] and is
//! downgraded to "absent" by the orchestrator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scenario::{ScenarioVariableRegistry, ValueMap};
use crate::scoring::twin::FixedFactors;
use crate::types::CaseSummary;

use super::ExternalAnalysis;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Generator returned no usable text")]
    EmptyResponse,

    #[error("Generator output failed schema validation: {0}")]
    SchemaMismatch(String),
}

/// Prompt payload for one generation attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorRequest {
    pub prompt: String,
}

/// The optional collaborator. Implementations must be cheap to drop; the
/// orchestrator abandons the future on timeout.
#[async_trait]
pub trait ExternalGenerator: Send + Sync {
    async fn generate(&self, request: &GeneratorRequest) -> Result<ExternalAnalysis, GeneratorError>;
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

/// Build the estimation prompt from the case summary, fixed factors, and
/// formatted scenario variables.
pub fn build_estimate_prompt(
    summary: Option<&CaseSummary>,
    factors: &FixedFactors,
    registry: &ScenarioVariableRegistry,
    variables: Option<&ValueMap>,
) -> GeneratorRequest {
    let mut prompt = String::with_capacity(2_000);

    prompt.push_str(
        "You are estimating the success probability of a private investigation case. ",
    );
    prompt.push_str("Respond with ONLY a valid JSON object (no markdown fences) matching:\n");
    prompt.push_str(
        r#"{"successRate": 0-100, "keyFactors": [".."], "riskAlerts": [".."], "recommendedActions": [".."], "knowledgeBase": [".."], "rationale": ".."}"#,
    );
    prompt.push_str("\n\n# Case\n");

    if let Some(summary) = summary {
        if let Some(title) = &summary.title {
            prompt.push_str(&format!("Title: {}\n", title));
        }
        if let Some(case_type) = &summary.case_type {
            prompt.push_str(&format!("Type: {}\n", case_type));
        }
        if let Some(objective) = &summary.objective {
            prompt.push_str(&format!("Objective: {}\n", objective));
        }
        for fact in &summary.key_facts {
            prompt.push_str(&format!("- {}\n", fact));
        }
    }

    if let Some(category) = factors.category.as_deref() {
        prompt.push_str(&format!("\n# Scenario ({})\n", category));
        let lines = match variables {
            Some(values) => registry.format_for_prompt(category, values),
            None => registry
                .defaults(category)
                .and_then(|values| registry.format_for_prompt(category, &values)),
        };
        if let Ok(lines) = lines {
            for line in lines {
                prompt.push_str(&format!("- {}\n", line));
            }
        }
    }

    GeneratorRequest { prompt }
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Extract the first complete JSON object and decode it. Schema validation
/// is the serde decode; anything else is a mismatch.
pub fn parse_external(text: &str) -> Result<ExternalAnalysis, GeneratorError> {
    let json = extract_json_object(text).ok_or(GeneratorError::EmptyResponse)?;
    serde_json::from_str(&json).map_err(|e| GeneratorError::SchemaMismatch(e.to_string()))
}

/// Find the first complete JSON object `{...}` in the text.
fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape {
            escape = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..=i].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Plain HTTP generator: POST the prompt, read back `{ "output": "..." }`,
/// parse the embedded JSON object.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    output: String,
}

impl HttpGenerator {
    pub fn new(endpoint: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl ExternalGenerator for HttpGenerator {
    async fn generate(&self, request: &GeneratorRequest) -> Result<ExternalAnalysis, GeneratorError> {
        let body = CompletionRequest {
            model: &self.model,
            input: &request.prompt,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(GeneratorError::Http(format!(
                "status {}",
                response.status()
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| GeneratorError::Http(e.to_string()))?;

        if completion.output.trim().is_empty() {
            return Err(GeneratorError::EmptyResponse);
        }

        parse_external(&completion.output)
    }
}
