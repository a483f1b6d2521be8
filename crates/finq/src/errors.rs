use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while dispatching or executing a tool call.
///
/// These never escape the orchestration loop: they are rendered into the
/// `tool` message so the model can read them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Tool execution failed: {0}")]
    ExecutionError(String),
}

pub type AgentResult<T> = Result<T, AgentError>;

/// Failure of the language-model backend. Network errors, non-200 statuses,
/// error bodies and unreadable replies all collapse into this one type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

impl ProviderError {
    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        ProviderError::ModelUnavailable(err.to_string())
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;
