//! Cached user profile snapshot
//!
//! The profile is whatever the API returned for the signed-in person. It is
//! stored and replaced wholesale; nothing in the client edits it field by
//! field.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Access role attached to a profile
///
/// Role strings the client does not know about are kept verbatim in
/// [`Role::Other`] so a newer server never breaks profile parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    User,
    Employee,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
            Self::Employee => "employee",
            Self::Other(role) => role,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Self::Admin,
            "user" => Self::User,
            "employee" => Self::Employee,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        match role {
            Role::Other(role) => role,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Profile of the signed-in person as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity document number, the primary key on the server
    #[serde(rename = "ci")]
    pub identity_document: String,

    #[serde(rename = "nombres", default)]
    pub first_names: String,

    #[serde(rename = "apellido_paterno", default, skip_serializing_if = "Option::is_none")]
    pub paternal_surname: Option<String>,

    #[serde(rename = "apellido_materno", default, skip_serializing_if = "Option::is_none")]
    pub maternal_surname: Option<String>,

    #[serde(rename = "nombre_completo", default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(rename = "correo", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "rol", alias = "role", default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,

    /// Remaining domain fields, kept opaque
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserProfile {
    pub fn id(&self) -> &str {
        &self.identity_document
    }

    /// Name to show in the UI, preferring the server-computed full name
    pub fn display_name(&self) -> String {
        if let Some(full_name) = self.full_name.as_deref().filter(|name| !name.is_empty()) {
            return full_name.to_string();
        }

        [
            Some(self.first_names.as_str()),
            self.paternal_surname.as_deref(),
            self.maternal_surname.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.role.as_ref() == Some(role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn profile(value: Value) -> UserProfile {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parses_server_profile() {
        let user = profile(json!({
            "ci": "1234567",
            "nombres": "Ana",
            "apellido_paterno": "Rojas",
            "apellido_materno": null,
            "nombre_completo": "Ana Rojas",
            "correo": "ana@example.com",
            "rol": "admin",
            "telefono": "70000000",
            "activo": true
        }));

        assert_eq!(user.id(), "1234567");
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));
        assert_eq!(user.role, Some(Role::Admin));
        assert_eq!(user.extra["telefono"], "70000000");
        assert!(user.is_admin());
    }

    #[test]
    fn test_role_key_alias() {
        let user = profile(json!({ "ci": "1", "nombres": "Luis", "role": "employee" }));
        assert_eq!(user.role, Some(Role::Employee));
        assert!(!user.is_admin());
    }

    #[test]
    fn test_unknown_role_is_preserved() {
        let user = profile(json!({ "ci": "1", "rol": "janitor" }));
        assert_eq!(user.role, Some(Role::Other("janitor".to_string())));

        let round_trip = serde_json::to_value(&user).unwrap();
        assert_eq!(round_trip["rol"], "janitor");
    }

    #[test]
    fn test_missing_role_is_never_admin() {
        let user = profile(json!({ "ci": "1", "rol": null }));
        assert_eq!(user.role, None);
        assert!(!user.is_admin());
        assert!(!user.has_role(&Role::User));
    }

    #[test]
    fn test_display_name_fallback() {
        let user = profile(json!({
            "ci": "1",
            "nombres": "Ana Maria",
            "apellido_paterno": "Rojas",
            "apellido_materno": "Vaca"
        }));
        assert_eq!(user.display_name(), "Ana Maria Rojas Vaca");

        let named = profile(json!({ "ci": "1", "nombres": "Ana", "nombre_completo": "Ana R." }));
        assert_eq!(named.display_name(), "Ana R.");
    }
}
