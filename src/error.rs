/// Errors surfaced by the recommendation engine.
///
/// Unknown users and dangling item references are not errors; they take the
/// fallback paths of the orchestrator instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine not ready: missing {}", missing.join(", "))]
    NotReady { missing: Vec<&'static str> },

    #[error("Validation error on {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}

impl EngineError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
