//! # Client Error Types
//!
//! Typed failures surfaced by the access layer, so callers can tell "not found"
//! apart from "temporarily unavailable".

use std::time::Duration;
use thiserror::Error;

/// Client operation result type
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The target run does not exist; never retried
    #[error("Workflow not found: {target_id}")]
    NotFound { target_id: String },

    #[error("Timed out after {attempts} attempts: {operation}")]
    Timeout { operation: String, attempts: u32 },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Rate limit exceeded, retry after {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    #[error("Unexpected client error: {0}")]
    Unknown(String),
}

impl ClientError {
    pub fn not_found(target_id: impl Into<String>) -> Self {
        Self::NotFound {
            target_id: target_id.into(),
        }
    }

    /// Timeouts and connection problems may succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Connection(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Short text suitable for showing to an end user
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { .. } => "The requested release could not be found.".to_string(),
            Self::Timeout { .. } => {
                "The release service took too long to respond. Please try again.".to_string()
            }
            Self::Connection(_) => {
                "The release service is temporarily unavailable. Please try again later.".to_string()
            }
            Self::InvalidRequest(detail) => format!("Invalid request: {detail}"),
            Self::RateLimited { retry_after } => format!(
                "Too many requests. Please wait {} seconds before trying again.",
                retry_after.as_secs().max(1)
            ),
            Self::Unknown(_) => "An unexpected error occurred.".to_string(),
        }
    }
}

impl From<crate::error::ReleaseError> for ClientError {
    fn from(err: crate::error::ReleaseError) -> Self {
        match err {
            crate::error::ReleaseError::InvalidEntityId(msg)
            | crate::error::ReleaseError::InvalidParameter(msg) => Self::InvalidRequest(msg),
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// What a remote boundary may raise
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("target not found: {0}")]
    NotFound(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Whether the error text points at a broken connection worth re-establishing
    pub fn indicates_connection_problem(&self) -> bool {
        let text = self.to_string().to_lowercase();
        text.contains("unavailable") || text.contains("connection")
    }
}
