//! Error types for the intelligence engine.
//!
//! Errors are classified by how the caller should react:
//! - Config: fatal at load/registration time, never surfaced per request
//! - InvalidInput: client error, rejected before any scoring runs
//! - Store/Generator: recovered locally by the engine, logged, never fatal

use thiserror::Error;

/// Error types for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    // Fatal at startup/registration
    #[error("Invalid rule pattern for '{rule_id}': {message}")]
    InvalidRulePattern { rule_id: String, message: String },

    #[error("Unknown scenario category: {0}")]
    UnknownCategory(String),

    #[error("Invalid scenario variable definition '{variable_id}': {message}")]
    InvalidVariableDefinition {
        variable_id: String,
        message: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Client errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Recovered locally; exposed for store management paths only
    #[error("Trend store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl EngineError {
    /// Returns true for errors that should abort startup rather than be
    /// handled per request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidRulePattern { .. }
                | EngineError::UnknownCategory(_)
                | EngineError::InvalidVariableDefinition { .. }
                | EngineError::Configuration(_)
        )
    }

    /// Returns true for caller mistakes (bad request shape).
    pub fn is_client_error(&self) -> bool {
        matches!(self, EngineError::InvalidInput(_))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Io(err.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::StoreUnavailable(err.to_string())
    }
}
