//! Session lifecycle shared by Edificio front ends
//!
//! Session service, auth state machine and route guards. Nothing here knows
//! about a UI toolkit; shells drive [`AuthContext`] and render whatever
//! [`GuardDecision`] tells them to.

pub mod auth;
pub mod routes;
pub mod services;

pub use auth::{AuthContext, AuthState, AuthStatus, GuardDecision};
pub use routes::AppRoute;
pub use services::{FailureKind, ServiceFailure, ServiceResult, SessionService, SignedIn};
