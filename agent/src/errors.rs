//! Error types for the capture agent

use thiserror::Error;

/// Main error type for the capture agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("No capture backend available: {0}")]
    NoBackendAvailable(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Hardware error: {0}")]
    HardwareError(String),

    #[error("Suspend error: {0}")]
    SuspendError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgentError {
    /// Fatal errors abort startup; everything else is logged and the loop
    /// moves on to the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::NoBackendAvailable(_) | AgentError::ConfigError(_)
        )
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(format!("{:#}", err))
    }
}
