//! Heuristic risk & matching intelligence for case intake.
//!
//! The engine behind an investigator-marketplace intake flow: rule-based
//! signal detection over conversation text, a persisted trend window with
//! spike alerts, deterministic case-success estimation and candidate
//! matching, a compliance scan for drafted text, and a blend policy that
//! folds in an optional external generator without ever depending on it.
//!
//! The deterministic path is the product; the AI path is an accelerant.
//! Every entry point returns a complete, bounded answer even with the
//! store down and the generator unreachable.

pub mod blend;
pub mod compliance;
pub mod config;
pub mod detect;
pub mod error;
pub mod insights;
pub mod rules;
pub mod scenario;
pub mod scoring;
pub mod trend;
pub mod types;
pub mod util;

use std::sync::Arc;
use std::time::Duration;

pub use blend::{BlendOrchestrator, BlendOutcome, ExternalAnalysis, FinalAnalysis};
pub use compliance::{ComplianceReport, ComplianceSegment};
pub use config::EngineConfig;
pub use detect::Signal;
pub use error::EngineError;
pub use rules::{RuleTable, Severity};
pub use scenario::ScenarioVariableRegistry;
pub use scoring::{
    CandidateProfile, FixedFactors, HeuristicAnalysis, MatchContext, MatchResult, RiskLevel,
};
pub use trend::{Alert, TrendSnapshot, TrendStore};
pub use types::{CaseSummary, InsightsInput, RealtimeInsights};

/// Install a default tracing subscriber honoring `RUST_LOG`. Hosts that
/// configure their own subscriber skip this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

/// Everything wired together: rule tables, scenario registry, trend store,
/// blend orchestrator. One instance per process; all entry points take
/// `&self`.
pub struct Engine {
    risk_table: RuleTable,
    compliance_table: RuleTable,
    registry: ScenarioVariableRegistry,
    store: TrendStore,
    orchestrator: BlendOrchestrator,
}

impl Engine {
    /// Build the engine from configuration. Rule tables and the scenario
    /// registry are validated here: a malformed pattern or definition
    /// fails startup, never a request.
    pub fn new(config: &EngineConfig) -> Result<Self, EngineError> {
        let store = match &config.trend_db_path {
            Some(path) => TrendStore::open(path.clone())?,
            None => TrendStore::open_default()?,
        };

        let generator_cfg = &config.generator;
        let orchestrator = if generator_cfg.enabled && !generator_cfg.endpoint.is_empty() {
            let generator = blend::HttpGenerator::new(
                generator_cfg.endpoint.clone(),
                generator_cfg.api_key.clone().unwrap_or_default(),
                generator_cfg.model.clone(),
            );
            BlendOrchestrator::with_generator(
                Arc::new(generator),
                Duration::from_secs(generator_cfg.timeout_secs),
            )
        } else {
            BlendOrchestrator::heuristic_only()
        };

        Ok(Self {
            risk_table: rules::risk_rules()?,
            compliance_table: rules::compliance_rules()?,
            registry: ScenarioVariableRegistry::builtin()?,
            store,
            orchestrator,
        })
    }

    /// Register an additional scenario category at startup.
    pub fn register_category(&mut self, entry: scenario::CategoryEntry) -> Result<(), EngineError> {
        self.registry.register(entry)
    }

    /// Combined per-turn intake call: detect, record trends, derive alerts,
    /// assemble the full insights payload.
    pub fn realtime_insights(&self, input: &InsightsInput) -> Result<RealtimeInsights, EngineError> {
        insights::realtime_insights(input, &self.risk_table, &self.store)
    }

    /// Detection only: no store write, no alert derivation.
    pub fn detect_signals(&self, text: &str) -> Vec<Signal> {
        detect::detect(text, &self.risk_table)
    }

    /// Rank candidates for a case. At most five results, best first.
    pub fn match_candidates(
        &self,
        candidates: &[CandidateProfile],
        ctx: &MatchContext,
    ) -> Vec<MatchResult> {
        scoring::match_candidates(candidates, ctx)
    }

    /// Deterministic case estimate. Raw scenario variables are sanitized
    /// against the category definitions before any delta applies.
    pub fn estimate(
        &self,
        factors: &FixedFactors,
        raw_variables: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<HeuristicAnalysis, EngineError> {
        let sanitized = self.sanitize_variables(factors, raw_variables)?;
        scoring::twin::estimate(factors, &self.registry, sanitized.as_ref())
    }

    /// Estimate, then offer the external generator one bounded attempt and
    /// blend if it answers in time.
    pub async fn estimate_blended(
        &self,
        summary: Option<&CaseSummary>,
        factors: &FixedFactors,
        raw_variables: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<BlendOutcome, EngineError> {
        let sanitized = self.sanitize_variables(factors, raw_variables)?;
        let heuristic = scoring::twin::estimate(factors, &self.registry, sanitized.as_ref())?;
        let request = blend::generator::build_estimate_prompt(
            summary,
            factors,
            &self.registry,
            sanitized.as_ref(),
        );
        Ok(self.orchestrator.run(&request, heuristic).await)
    }

    /// Scan drafted text segments against the compliance table.
    pub fn scan_compliance(&self, segments: &[ComplianceSegment]) -> ComplianceReport {
        compliance::scan(segments, &self.compliance_table)
    }

    /// Current trend snapshots, pruned, sorted by lifetime count.
    pub fn trend_snapshots(&self) -> Vec<TrendSnapshot> {
        self.store.load()
    }

    pub fn registry(&self) -> &ScenarioVariableRegistry {
        &self.registry
    }

    fn sanitize_variables(
        &self,
        factors: &FixedFactors,
        raw_variables: Option<&serde_json::Map<String, serde_json::Value>>,
    ) -> Result<Option<scenario::ValueMap>, EngineError> {
        match (factors.category.as_deref(), raw_variables) {
            (Some(category), Some(raw)) => Ok(Some(self.registry.sanitize(category, raw)?)),
            _ => Ok(None),
        }
    }
}
