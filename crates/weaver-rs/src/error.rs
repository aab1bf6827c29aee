//! Error types for agent calls and orchestration.
//!
//! Tool failures never surface here: tools report problems as `"Error: ..."`
//! result strings so the model can react to them.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single agent call.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("{0}")]
    Unavailable(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("process error: {0}")]
    Process(String),
}

impl AgentError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Cancelled)
    }
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AgentError::Request(format!("timeout: {e}"))
        } else {
            AgentError::Request(e.to_string())
        }
    }
}

/// Top-level error returned by the orchestrator.
#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("senior agent error: {0}")]
    Senior(AgentError),

    #[error("junior agent error: {0}")]
    Junior(AgentError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WeaverError>;
