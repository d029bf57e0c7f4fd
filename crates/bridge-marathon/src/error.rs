//! Marathon client and event decoding errors.

use std::time::Duration;

use thiserror::Error;

/// Errors from a Marathon REST call.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("marathon returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("marathon transport error: {0}")]
    Transport(String),

    #[error("marathon request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to decode marathon response: {0}")]
    Decode(String),

    #[error("invalid marathon URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// HTTP status code, if Marathon answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Transport failures, timeouts, and 5xx answers may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// A recognized SSE event whose JSON body does not match its schema.
#[derive(Debug, Error)]
#[error("malformed {event} body: {source}")]
pub struct EventDecodeError {
    pub event: String,
    #[source]
    pub source: serde_json::Error,
}
