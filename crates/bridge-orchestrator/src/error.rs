//! Orchestrator errors.

use thiserror::Error;

use bridge_builder::BuildError;
use bridge_core::ConfigError;
use bridge_marathon::ClientError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("build failed: {0}")]
    Build(#[from] BuildError),

    #[error("marathon: {0}")]
    Marathon(#[from] ClientError),

    /// Marathon answered 2xx with a body the bridge cannot use.
    #[error("unexpected marathon response: {0}")]
    UnexpectedResponse(String),
}

impl OrchestratorError {
    /// HTTP status of a Marathon error response, if any.
    pub fn marathon_status(&self) -> Option<u16> {
        match self {
            Self::Marathon(e) => e.status(),
            _ => None,
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
