//! Route guards
//!
//! Pure policy over [`AuthState`]: each guard decides whether a view
//! renders, waits, redirects or shows the access-denied view. Guards keep no
//! state of their own.

use super::context::AuthState;
use crate::routes::AppRoute;
use edificio_core::Role;

/// What the shell should do with a guarded view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Startup check still running; show a neutral loading state
    Loading,
    Render,
    /// Navigate elsewhere, remembering where the user was headed
    Redirect { to: String, from: Option<String> },
    /// Signed in but missing the role; not a redirect
    AccessDenied { required_role: Role },
}

/// Redirect hints for pages that pick their own destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectFlags {
    pub is_authenticated: bool,
    pub loading: bool,
    pub should_redirect_to_login: bool,
    pub should_redirect_to_dashboard: bool,
}

/// Guard for views that need a session, optionally with a role
pub fn protected(state: &AuthState, required_role: Option<&Role>, location: &str) -> GuardDecision {
    if state.is_initializing() {
        return GuardDecision::Loading;
    }

    if !state.is_authenticated() {
        return GuardDecision::Redirect {
            to: AppRoute::Login.path().to_string(),
            from: Some(location.to_string()),
        };
    }

    match required_role {
        Some(role) if !state.has_role(role) => GuardDecision::AccessDenied {
            required_role: role.clone(),
        },
        _ => GuardDecision::Render,
    }
}

/// Guard for admin-only views
pub fn admin_only(state: &AuthState, location: &str) -> GuardDecision {
    protected(state, Some(&Role::Admin), location)
}

/// Guard for login/register: signed-in users go to the dashboard
pub fn public_only(state: &AuthState) -> GuardDecision {
    if state.is_initializing() {
        return GuardDecision::Loading;
    }

    if state.is_authenticated() {
        GuardDecision::Redirect {
            to: AppRoute::Dashboard.path().to_string(),
            from: None,
        }
    } else {
        GuardDecision::Render
    }
}

pub fn redirect_flags(state: &AuthState) -> RedirectFlags {
    let loading = state.is_initializing();
    let is_authenticated = state.is_authenticated();
    RedirectFlags {
        is_authenticated,
        loading,
        should_redirect_to_login: !loading && !is_authenticated,
        should_redirect_to_dashboard: !loading && is_authenticated,
    }
}

/// Where to go after signing in: back where the user was headed, else the
/// dashboard
pub fn post_login_destination(from: Option<&str>) -> String {
    from.filter(|path| path.starts_with('/') && !path.starts_with("//"))
        .filter(|path| {
            !matches!(
                AppRoute::from_path(path),
                Some(AppRoute::Login | AppRoute::Register)
            )
        })
        .unwrap_or_else(|| AppRoute::Dashboard.path())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::context::AuthAction;
    use edificio_core::UserProfile;
    use serde_json::json;

    fn signed_in(role: &str) -> AuthState {
        let user: UserProfile =
            serde_json::from_value(json!({ "ci": "1", "nombres": "Ana", "rol": role })).unwrap();
        AuthState::default().reduce(AuthAction::Initialized(Some(user)))
    }

    fn signed_out() -> AuthState {
        AuthState::default().reduce(AuthAction::Initialized(None))
    }

    #[test]
    fn test_every_guard_waits_while_initializing() {
        let state = AuthState::default();
        assert_eq!(protected(&state, None, "/dashboard"), GuardDecision::Loading);
        assert_eq!(admin_only(&state, "/admin"), GuardDecision::Loading);
        assert_eq!(public_only(&state), GuardDecision::Loading);

        let flags = redirect_flags(&state);
        assert!(flags.loading);
        assert!(!flags.should_redirect_to_login);
        assert!(!flags.should_redirect_to_dashboard);
    }

    #[test]
    fn test_protected_redirects_to_login_preserving_location() {
        assert_eq!(
            protected(&signed_out(), None, "/dashboard?tab=pagos"),
            GuardDecision::Redirect {
                to: "/login".to_string(),
                from: Some("/dashboard?tab=pagos".to_string()),
            }
        );
        assert!(redirect_flags(&signed_out()).should_redirect_to_login);
    }

    #[test]
    fn test_protected_renders_for_matching_role() {
        assert_eq!(protected(&signed_in("user"), None, "/dashboard"), GuardDecision::Render);
        assert_eq!(
            protected(&signed_in("employee"), Some(&Role::Employee), "/dashboard"),
            GuardDecision::Render
        );
        assert_eq!(admin_only(&signed_in("admin"), "/admin"), GuardDecision::Render);
    }

    #[test]
    fn test_role_mismatch_is_access_denied_not_redirect() {
        assert_eq!(
            admin_only(&signed_in("user"), "/admin"),
            GuardDecision::AccessDenied {
                required_role: Role::Admin
            }
        );
    }

    #[test]
    fn test_public_only() {
        assert_eq!(public_only(&signed_out()), GuardDecision::Render);
        assert_eq!(
            public_only(&signed_in("user")),
            GuardDecision::Redirect {
                to: "/dashboard".to_string(),
                from: None
            }
        );
        assert!(redirect_flags(&signed_in("user")).should_redirect_to_dashboard);
    }

    #[test]
    fn test_post_login_destination() {
        assert_eq!(post_login_destination(Some("/admin")), "/admin");
        assert_eq!(post_login_destination(None), "/dashboard");
        assert_eq!(post_login_destination(Some("/login")), "/dashboard");
        assert_eq!(post_login_destination(Some("https://evil.example")), "/dashboard");
    }
}
