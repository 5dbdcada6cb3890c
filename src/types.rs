//! Boundary contract types.
//!
//! Everything here crosses the process boundary as JSON (camelCase). The
//! engine validates shape before any scoring runs; internal working types
//! live with the modules that compute them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::detect::Signal;
use crate::scoring::RiskLevel;
use crate::trend::Alert;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One turn of the intake conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

/// Structured case summary maintained by the intake flow. Every field is
/// optional; early conversations have almost nothing filled in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default)]
    pub key_facts: Vec<String>,
    #[serde(default)]
    pub missing_details: Vec<String>,
    #[serde(default)]
    pub recommended_documents: Vec<String>,
    #[serde(default)]
    pub next_questions: Vec<String>,
}

/// Input to the realtime-insights call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsInput {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_summary: Option<CaseSummary>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_summary: Option<String>,
}

/// A corpus entry surfaced as a recommendation, with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub focus: String,
    pub success_criteria: Vec<String>,
    pub notes: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPhase {
    pub name: String,
    pub duration_days: u32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowSimulation {
    pub total_duration_days: u32,
    pub phases: Vec<FlowPhase>,
    pub resource_notes: Vec<String>,
    pub risk_notes: Vec<String>,
    pub checkpoints: Vec<String>,
}

/// Combined realtime-insights response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInsights {
    pub generated_at: DateTime<Utc>,
    pub risk_score: u8,
    pub overall_risk: RiskLevel,
    pub signals: Vec<Signal>,
    pub alerts: Vec<Alert>,
    pub recommendations: Vec<Recommendation>,
    pub next_actions: Vec<String>,
    pub action_plan: ActionPlan,
    pub flow_simulation: FlowSimulation,
    pub follow_up_questions: Vec<String>,
    pub summary: String,
}
