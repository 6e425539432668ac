//! Authentication module

pub mod context;
pub mod error_messages;
pub mod guards;

// Re-export commonly used items
pub use context::{AuthAction, AuthContext, AuthState, AuthStatus, Notice, NoticeLevel};
pub use guards::{
    GuardDecision, RedirectFlags, admin_only, post_login_destination, protected, public_only,
    redirect_flags,
};
