//! User-facing messages
//!
//! Used when the server sends no message of its own. The server's messages
//! are already user-friendly and always take precedence.

use edificio_core::{Role, UserProfile};

pub const REGISTER_FAILED: &str = "Error al registrar usuario";
pub const LOGIN_FAILED: &str = "Error al iniciar sesión";
pub const GOOGLE_LOGIN_FAILED: &str = "Error al iniciar sesión con Google";
pub const PROFILE_FAILED: &str = "Error al obtener perfil";
pub const CONNECTION_ERROR: &str = "Error de conexión";
pub const SESSION_EXPIRED: &str = "Tu sesión ha expirado. Inicia sesión nuevamente.";
pub const OAUTH_CALLBACK_INVALID: &str = "Respuesta de Google incompleta";
pub const ACCESS_DENIED: &str = "No tienes permisos para acceder a esta página.";

/// Toast shown after a successful sign-in
pub fn welcome(user: &UserProfile) -> String {
    let name = user.display_name();
    if name.is_empty() {
        "¡Bienvenido!".to_string()
    } else {
        format!("¡Bienvenido, {name}!")
    }
}

/// Body of the access-denied view
pub fn access_denied(required_role: &Role) -> String {
    format!("{ACCESS_DENIED} Se requiere rol: {required_role}")
}
