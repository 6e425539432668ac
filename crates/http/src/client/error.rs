//! Client error types

use crate::types::{ErrorBody, FieldErrors};
use edificio_core::StoreError;
use thiserror::Error;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    /// Network or request error; no response reached us
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server rejected the request
    #[error("Server rejected request ({status}): {}", .body.message_or_default())]
    Status { status: u16, body: ErrorBody },

    /// Authentication failed (401 after the refresh policy ran)
    #[error("Authentication failed: {}", .body.message_or_default())]
    AuthenticationFailed { body: ErrorBody },

    /// Forbidden
    #[error("Forbidden: {}", .body.message_or_default())]
    Forbidden { body: ErrorBody },

    /// The refresh token was rejected; the local session has been cleared
    #[error("Session expired, please sign in again")]
    SessionExpired,

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Response parsed but does not match the endpoint's contract
    #[error("Unexpected response payload: {0}")]
    InvalidPayload(String),

    /// Token store write failed
    #[error("Token storage error: {0}")]
    Storage(#[from] StoreError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create error from HTTP status code
    pub fn from_status(status: reqwest::StatusCode, body: ErrorBody) -> Self {
        match status.as_u16() {
            401 => Self::AuthenticationFailed { body },
            403 => Self::Forbidden { body },
            status => Self::Status { status, body },
        }
    }

    /// HTTP status of the rejected response, if there was one
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::AuthenticationFailed { .. } | Self::SessionExpired => Some(401),
            Self::Forbidden { .. } => Some(403),
            _ => None,
        }
    }

    /// Parsed error envelope of the rejected response
    pub const fn error_body(&self) -> Option<&ErrorBody> {
        match self {
            Self::Status { body, .. }
            | Self::AuthenticationFailed { body }
            | Self::Forbidden { body } => Some(body),
            _ => None,
        }
    }

    /// Server-provided message, if any
    pub fn server_message(&self) -> Option<&str> {
        self.error_body().and_then(|body| body.message.as_deref())
    }

    /// Per-field validation messages sent by the server
    pub fn field_errors(&self) -> FieldErrors {
        self.error_body()
            .map(ErrorBody::field_errors)
            .unwrap_or_default()
    }

    /// True when the server was never reached
    pub const fn is_network(&self) -> bool {
        matches!(self, Self::Request(_))
    }

    /// True for 401-class failures, including an expired session
    pub const fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::SessionExpired)
    }
}
