//! Wire schemas for the auth endpoints
//!
//! Every endpoint answers with the same envelope:
//! `{"success": bool, "data": {...}, "message": "...", "errors": {...}}`.
//! Payloads are parsed into these types before anything reads them, so a
//! malformed response surfaces as a typed error instead of missing fields.

use crate::client::error::ClientError;
use chrono::NaiveDate;
use edificio_core::UserProfile;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Field name → validation messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Standard response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
}

/// Envelope of a rejected request; `data` is kept untyped
pub type ErrorBody = ApiEnvelope<Value>;

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload of a successful response
    ///
    /// # Errors
    ///
    /// `success: false` becomes a rejection carrying the envelope's message
    /// and field errors; a successful envelope without `data` is an invalid
    /// payload.
    pub fn into_data(self, status: reqwest::StatusCode) -> Result<T, ClientError> {
        if !self.success {
            let body = ErrorBody {
                success: false,
                data: None,
                message: self.message,
                errors: self.errors,
            };
            return Err(ClientError::from_status(status, body));
        }

        self.data
            .ok_or_else(|| ClientError::InvalidPayload("response is missing `data`".to_string()))
    }

    /// Like [`Self::into_data`], also handing back the top-level `message`
    ///
    /// # Errors
    ///
    /// Same as [`Self::into_data`]
    pub fn into_parts(
        mut self,
        status: reqwest::StatusCode,
    ) -> Result<(T, Option<String>), ClientError> {
        let message = if self.success {
            self.message.take()
        } else {
            None
        };
        self.into_data(status).map(|data| (data, message))
    }

    /// Normalized field errors; strings become one-element lists
    pub fn field_errors(&self) -> FieldErrors {
        let Some(Value::Object(errors)) = &self.errors else {
            return FieldErrors::new();
        };

        errors
            .iter()
            .filter_map(|(field, messages)| {
                let messages: Vec<String> = match messages {
                    Value::String(message) => vec![message.clone()],
                    Value::Array(items) => items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect(),
                    _ => return None,
                };
                (!messages.is_empty()).then(|| (field.clone(), messages))
            })
            .collect()
    }
}

impl ErrorBody {
    /// Build an error body from a non-JSON response
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        Self {
            success: false,
            data: None,
            message: (!text.is_empty()).then(|| text.to_string()),
            errors: None,
        }
    }

    /// Parse a rejected response body, falling back to its raw text
    pub fn parse(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Self::from_text(&String::from_utf8_lossy(bytes)))
    }

    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or("no message")
    }
}

/// Tokens and profile returned by register, login and Google sign-in
///
/// The profile's canonical key is `user`; `persona` is accepted as an alias.
/// A payload carrying both is rejected rather than guessing which wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthPayload {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(alias = "persona")]
    pub user: UserProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /api/auth/verify`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyPayload {
    #[serde(alias = "persona")]
    pub user: UserProfile,
    #[serde(default)]
    pub is_valid: Option<bool>,
}

/// `GET /api/auth/profile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilePayload {
    #[serde(alias = "persona")]
    pub user: UserProfile,
}

/// `POST /api/auth/refresh`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub access_token: String,
}

/// Biological sex as the registration form records it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
}

/// `POST /api/auth/register`
#[derive(Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "ci")]
    pub identity_document: String,
    #[serde(rename = "nombres")]
    pub first_names: String,
    #[serde(rename = "apellido_paterno")]
    pub paternal_surname: String,
    #[serde(rename = "apellido_materno", skip_serializing_if = "Option::is_none")]
    pub maternal_surname: Option<String>,
    #[serde(rename = "fecha_nacimiento")]
    pub birth_date: NaiveDate,
    #[serde(rename = "sexo")]
    pub sex: Sex,
    #[serde(rename = "telefono", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "correo")]
    pub email: String,
    #[serde(rename = "direccion", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub password: String,
    pub password_confirm: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("identity_document", &self.identity_document)
            .field("first_names", &self.first_names)
            .field("paternal_surname", &self.paternal_surname)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish_non_exhaustive()
    }
}

/// `POST /api/auth/login`
#[derive(Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "correo")]
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `POST /api/auth/google/user`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleLoginRequest {
    pub id_token: String,
}
