use serde::{Deserialize, Serialize};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum AgentError {
    #[error("A turn is already in progress for this conversation")]
    TurnInProgress,

    #[error("unknown tool: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments for {tool}: {detail}")]
    InvalidParameters { tool: String, detail: String },

    #[error("Model invocation failed: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type AgentResult<T> = Result<T, AgentError>;
