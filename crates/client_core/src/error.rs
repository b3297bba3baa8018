use shared::error::{EndpointFailure, ErrorCode};
use thiserror::Error;

/// Failure of a remote service call.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The endpoint answered and reported a failure (validation, server error).
    #[error("endpoint error: {0}")]
    Endpoint(#[from] EndpointFailure),
    /// The service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn endpoint(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Endpoint(EndpointFailure::new(code, message))
    }

    pub fn is_endpoint(&self) -> bool {
        matches!(self, Self::Endpoint(_))
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Endpoint(err) => Some(err.code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_decode() {
            Self::Decode(value.to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}

/// Errors surfaced by store commands.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("event has not been persisted yet and has no id")]
    MissingEventId,
    #[error("page size must be greater than zero")]
    InvalidPageSize,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ClientError {
    /// Whether the error should be shown as a dismissible server notification.
    pub fn is_endpoint(&self) -> bool {
        matches!(self, Self::Backend(err) if err.is_endpoint())
    }
}
