//! Application route table
//!
//! Maps each path to the guard that protects it.

use crate::auth::context::AuthState;
use crate::auth::guards::{self, GuardDecision};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppRoute {
    Home,
    Login,
    Register,
    OAuthCallback,
    Dashboard,
    Admin,
}

/// Guard policy attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAccess {
    Open,
    PublicOnly,
    Protected,
    AdminOnly,
}

impl AppRoute {
    pub const ALL: [Self; 6] = [
        Self::Home,
        Self::Login,
        Self::Register,
        Self::OAuthCallback,
        Self::Dashboard,
        Self::Admin,
    ];

    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Login => "/login",
            Self::Register => "/register",
            Self::OAuthCallback => "/auth/callback",
            Self::Dashboard => "/dashboard",
            Self::Admin => "/admin",
        }
    }

    pub const fn access(self) -> RouteAccess {
        match self {
            Self::Home | Self::OAuthCallback => RouteAccess::Open,
            Self::Login | Self::Register => RouteAccess::PublicOnly,
            Self::Dashboard => RouteAccess::Protected,
            Self::Admin => RouteAccess::AdminOnly,
        }
    }

    /// Match a location, ignoring query, fragment and a trailing slash
    pub fn from_path(location: &str) -> Option<Self> {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = if path.len() > 1 {
            path.trim_end_matches('/')
        } else {
            path
        };
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    /// Guard decision for `location`; `None` for unknown paths
    pub fn resolve(location: &str, state: &AuthState) -> Option<GuardDecision> {
        let route = Self::from_path(location)?;
        Some(match route.access() {
            RouteAccess::Open => GuardDecision::Render,
            RouteAccess::PublicOnly => guards::public_only(state),
            RouteAccess::Protected => guards::protected(state, None, location),
            RouteAccess::AdminOnly => guards::admin_only(state, location),
        })
    }
}

impl fmt::Display for AppRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}
