use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),

    #[error("Unknown metric type: {0}")]
    UnknownMetricType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Evaluation stopped: {0}")]
    Stopped(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, EvalError>;

impl From<serde_json::Error> for EvalError {
    fn from(err: serde_json::Error) -> Self {
        EvalError::Serialization(err.to_string())
    }
}

impl From<validator::ValidationErrors> for EvalError {
    fn from(err: validator::ValidationErrors) -> Self {
        EvalError::Validation(err.to_string())
    }
}
