//! Authentication context
//!
//! [`AuthState`] is a plain value driven by a reducer. [`AuthContext`] owns
//! the current state, runs the session service calls that produce actions,
//! and publishes every new state on a watch channel for UI subscribers.
//! There is no global instance: the shell creates one context and hands
//! clones of it to whatever needs session state.

use super::error_messages;
use crate::services::{ServiceResult, SessionService, SignedIn};
use edificio_core::{Role, UserProfile};
use edificio_http::SessionExpiredHook;
use edificio_http::types::RegisterRequest;
use std::sync::{Arc, Weak};
use tokio::sync::{OnceCell, watch};
use tracing::info;

/// Where the session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AuthStatus {
    /// Startup verification has not finished yet
    #[default]
    Initializing,
    Authenticated,
    Unauthenticated,
}

/// Severity of a transient notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// Toast-style notification for a user-initiated action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Authentication state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthState {
    pub status: AuthStatus,
    pub user: Option<UserProfile>,
    pub notice: Option<Notice>,
}

/// Authentication state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum AuthAction {
    /// Startup check settled, with the verified profile if any
    Initialized(Option<UserProfile>),
    LoggedIn(UserProfile),
    LoginFailed(String),
    ProfileRefreshed(UserProfile),
    LoggedOut,
    /// A refresh failed mid-session and the store was cleared
    SessionExpired,
    ClearNotice,
}

impl AuthState {
    /// Apply an action, returning the next state
    #[must_use]
    pub fn reduce(&self, action: AuthAction) -> Self {
        match action {
            AuthAction::Initialized(user) => Self {
                status: if user.is_some() {
                    AuthStatus::Authenticated
                } else {
                    AuthStatus::Unauthenticated
                },
                user,
                notice: self.notice.clone(),
            },
            AuthAction::LoggedIn(user) => Self {
                status: AuthStatus::Authenticated,
                notice: Some(Notice::success(error_messages::welcome(&user))),
                user: Some(user),
            },
            AuthAction::LoginFailed(message) => Self {
                notice: Some(Notice::error(message)),
                ..self.clone()
            },
            AuthAction::ProfileRefreshed(user) if self.is_authenticated() => Self {
                user: Some(user),
                ..self.clone()
            },
            AuthAction::ProfileRefreshed(_) => self.clone(),
            AuthAction::ClearNotice => Self {
                notice: None,
                ..self.clone()
            },
            AuthAction::LoggedOut => Self {
                status: AuthStatus::Unauthenticated,
                user: None,
                notice: None,
            },
            // Guards must not decide before the startup check settles
            AuthAction::SessionExpired if self.is_initializing() => Self {
                user: None,
                ..self.clone()
            },
            AuthAction::SessionExpired => Self {
                status: AuthStatus::Unauthenticated,
                user: None,
                notice: self
                    .is_authenticated()
                    .then(|| Notice::error(error_messages::SESSION_EXPIRED))
                    .or_else(|| self.notice.clone()),
            },
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }

    pub fn is_initializing(&self) -> bool {
        self.status == AuthStatus::Initializing
    }

    /// Role check against the cached profile; never re-fetched
    pub fn has_role(&self, role: &Role) -> bool {
        self.user.as_ref().is_some_and(|user| user.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::Admin)
    }
}

/// Cloneable handle on the session state of one application instance
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    service: SessionService,
    state: watch::Sender<AuthState>,
    initialized: OnceCell<AuthStatus>,
}

impl AuthContext {
    /// Create a context in the `Initializing` state
    ///
    /// Installs [`Self::session_expired_hook`] on the service's client so a
    /// failed mid-session refresh ends the session here too.
    pub fn new(service: SessionService) -> Self {
        let (state, _) = watch::channel(AuthState::default());
        let context = Self {
            inner: Arc::new(ContextInner {
                service,
                state,
                initialized: OnceCell::new(),
            }),
        };
        context
            .inner
            .service
            .client()
            .set_session_expired_hook(context.session_expired_hook());
        context
    }

    pub fn service(&self) -> &SessionService {
        &self.inner.service
    }

    /// Run the startup check
    ///
    /// Runs once per context. Concurrent and later callers wait for the same
    /// check and get its outcome.
    pub async fn initialize(&self) -> AuthStatus {
        *self
            .inner
            .initialized
            .get_or_init(|| async {
                let user = self.verify_stored_session().await;
                self.dispatch(AuthAction::Initialized(user));
                let status = self.state().status;
                info!(?status, "Session initialized");
                status
            })
            .await
    }

    async fn verify_stored_session(&self) -> Option<UserProfile> {
        let service = &self.inner.service;
        if !service.is_authenticated() {
            return None;
        }

        match service.verify().await {
            Ok(user) => Some(user),
            Err(failure) => {
                info!(kind = ?failure.kind, "Stored session rejected, clearing it");
                service.clear_local();
                None
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<SignedIn> {
        let result = self.inner.service.login(email, password).await;
        self.apply_sign_in(result)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ServiceResult<SignedIn> {
        let result = self.inner.service.register(request).await;
        self.apply_sign_in(result)
    }

    pub async fn login_with_google(&self, credential: &str) -> ServiceResult<SignedIn> {
        let result = self.inner.service.login_with_google(credential).await;
        self.apply_sign_in(result)
    }

    pub async fn complete_oauth_callback(&self, callback_url: &str) -> ServiceResult<SignedIn> {
        let result = self.inner.service.complete_oauth_callback(callback_url).await;
        self.apply_sign_in(result)
    }

    /// End the session
    ///
    /// The state is `Unauthenticated` before the server is contacted.
    pub async fn logout(&self) {
        self.dispatch(AuthAction::LoggedOut);
        self.inner.service.logout().await;
    }

    /// Re-fetch the profile, replacing the cached one
    pub async fn refresh_profile(&self) -> ServiceResult<UserProfile> {
        let user = self.inner.service.get_profile().await?;
        self.dispatch(AuthAction::ProfileRefreshed(user.clone()));
        Ok(user)
    }

    pub fn state(&self) -> AuthState {
        self.inner.state.borrow().clone()
    }

    /// Watch every state change
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub fn user(&self) -> Option<UserProfile> {
        self.inner.state.borrow().user.clone()
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.inner.state.borrow().has_role(role)
    }

    pub fn is_admin(&self) -> bool {
        self.inner.state.borrow().is_admin()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    pub fn is_initializing(&self) -> bool {
        self.inner.state.borrow().is_initializing()
    }

    pub fn dismiss_notice(&self) {
        self.dispatch(AuthAction::ClearNotice);
    }

    /// Callback for [`edificio_http::ApiClientBuilder::on_session_expired`]
    ///
    /// Holds a weak reference, so the client keeping it does not keep the
    /// context alive.
    pub fn session_expired_hook(&self) -> SessionExpiredHook {
        let inner: Weak<ContextInner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            if let Some(inner) = inner.upgrade() {
                info!("Session expired");
                inner
                    .state
                    .send_modify(|state| *state = state.reduce(AuthAction::SessionExpired));
            }
        })
    }

    fn dispatch(&self, action: AuthAction) {
        self.inner
            .state
            .send_modify(|state| *state = state.reduce(action));
    }

    fn apply_sign_in(&self, result: ServiceResult<SignedIn>) -> ServiceResult<SignedIn> {
        match &result {
            Ok(signed_in) => self.dispatch(AuthAction::LoggedIn(signed_in.user.clone())),
            Err(failure) => self.dispatch(AuthAction::LoginFailed(failure.message.clone())),
        }
        result
    }
}
