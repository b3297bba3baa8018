use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::EndpointErrorBody;

/// Coarse classification of an endpoint failure, derived from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            429 => Self::RateLimited,
            _ => Self::Internal,
        }
    }
}

/// Failure reported by a reachable endpoint. Shown to the user as a
/// dismissible notification carrying `message`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code:?}: {message}")]
pub struct EndpointFailure {
    pub code: ErrorCode,
    pub message: String,
    /// Server-side exception class, when the body names one.
    pub exception_type: Option<String>,
}

impl EndpointFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            exception_type: None,
        }
    }

    /// Builds the failure from a non-2xx response. Falls back to the raw body,
    /// then to the status line, when the body is not an error document.
    pub fn from_response(status: u16, reason: &str, body: &str) -> Self {
        let code = ErrorCode::from_status(status);
        match serde_json::from_str::<EndpointErrorBody>(body) {
            Ok(parsed) if !parsed.message.is_empty() => Self {
                code,
                message: parsed.message,
                exception_type: parsed.error_type,
            },
            _ if body.trim().is_empty() => Self::new(code, format!("{status} {reason}")),
            _ => Self::new(code, body.trim()),
        }
    }
}
