//! Uniform failure shape of the session service
//!
//! Every public service operation returns [`ServiceResult`]. Transport and
//! parse errors never escape: they are folded into a [`ServiceFailure`]
//! carrying a user-facing message and, for validation errors, the messages
//! attached to each form field.

use crate::auth::error_messages;
use edificio_http::ClientError;
use edificio_http::types::FieldErrors;
use thiserror::Error;

/// Result of a session service operation
pub type ServiceResult<T> = Result<T, ServiceFailure>;

/// Category of a failed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The server was never reached
    Network,
    /// The server returned per-field validation messages
    Validation,
    /// Credentials or session rejected (401)
    Authentication,
    /// Valid session without the required permissions (403)
    Authorization,
    /// Any other rejection, including malformed responses
    Rejected,
    /// The local token store could not be written
    Storage,
}

/// A failed operation, ready to show to the user
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ServiceFailure {
    pub kind: FailureKind,
    pub message: String,
    pub field_errors: FieldErrors,
}

impl ServiceFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field_errors: FieldErrors::new(),
        }
    }

    /// Fold a client error into a failure, using `fallback` when the server
    /// sent no message of its own
    pub fn from_client_error(error: &ClientError, fallback: &str) -> Self {
        let server_message = || {
            error
                .server_message()
                .filter(|message| !message.trim().is_empty())
                .unwrap_or(fallback)
                .to_string()
        };

        match error {
            ClientError::Request(_) => {
                Self::new(FailureKind::Network, error_messages::CONNECTION_ERROR)
            }
            ClientError::SessionExpired => {
                Self::new(FailureKind::Authentication, error_messages::SESSION_EXPIRED)
            }
            ClientError::AuthenticationFailed { .. } => {
                Self::new(FailureKind::Authentication, server_message())
            }
            ClientError::Forbidden { .. } => {
                Self::new(FailureKind::Authorization, server_message())
            }
            ClientError::Status { .. } => {
                let field_errors = error.field_errors();
                let kind = if field_errors.is_empty() {
                    FailureKind::Rejected
                } else {
                    FailureKind::Validation
                };
                Self {
                    kind,
                    message: server_message(),
                    field_errors,
                }
            }
            ClientError::Storage(_) => Self::new(FailureKind::Storage, fallback),
            ClientError::Serialization(_)
            | ClientError::InvalidPayload(_)
            | ClientError::Configuration(_) => Self::new(FailureKind::Rejected, fallback),
        }
    }

    /// Messages for one form field, joined the way the form displays them
    pub fn field_message(&self, field: &str) -> Option<String> {
        self.field_errors
            .get(field)
            .filter(|messages| !messages.is_empty())
            .map(|messages| messages.join(", "))
    }

    pub fn has_field_errors(&self) -> bool {
        !self.field_errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edificio_http::StatusCode;
    use edificio_http::types::ErrorBody;
    use serde_json::json;

    fn status_error(status: u16, body: serde_json::Value) -> ClientError {
        ClientError::from_status(
            StatusCode::from_u16(status).unwrap(),
            ErrorBody::parse(body.to_string().as_bytes()),
        )
    }

    #[test]
    fn test_validation_errors_are_kept_per_field() {
        let error = status_error(
            400,
            json!({
                "success": false,
                "message": "Errores de validación",
                "errors": {
                    "ci": ["Ya existe un usuario registrado con este CI"],
                    "password": ["Debe tener al menos 6 caracteres", "Debe contener un número"]
                }
            }),
        );

        let failure = ServiceFailure::from_client_error(&error, "fallback");
        assert_eq!(failure.kind, FailureKind::Validation);
        assert_eq!(failure.message, "Errores de validación");
        assert_eq!(
            failure.field_message("password").as_deref(),
            Some("Debe tener al menos 6 caracteres, Debe contener un número")
        );
        assert_eq!(failure.field_message("correo"), None);
    }

    #[test]
    fn test_fallback_message_when_server_is_silent() {
        let error = status_error(500, json!({ "success": false }));
        let failure = ServiceFailure::from_client_error(&error, "Error al iniciar sesión");
        assert_eq!(failure.kind, FailureKind::Rejected);
        assert_eq!(failure.message, "Error al iniciar sesión");
        assert!(!failure.has_field_errors());
    }

    #[test]
    fn test_auth_and_permission_kinds() {
        let unauthorized = status_error(401, json!({ "message": "Credenciales inválidas" }));
        let failure = ServiceFailure::from_client_error(&unauthorized, "x");
        assert_eq!(failure.kind, FailureKind::Authentication);
        assert_eq!(failure.message, "Credenciales inválidas");

        let forbidden = status_error(403, json!({}));
        let failure = ServiceFailure::from_client_error(&forbidden, "x");
        assert_eq!(failure.kind, FailureKind::Authorization);

        let expired = ServiceFailure::from_client_error(&ClientError::SessionExpired, "x");
        assert_eq!(expired.kind, FailureKind::Authentication);
        assert_eq!(expired.message, error_messages::SESSION_EXPIRED);
    }
}
