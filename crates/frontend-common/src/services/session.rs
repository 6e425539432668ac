//! Session service
//!
//! One operation per use case. Successful sign-ins are written to the token
//! store with a full overwrite; failures come back as [`ServiceFailure`].

use super::failure::{FailureKind, ServiceFailure, ServiceResult};
use crate::auth::error_messages;
use chrono::Utc;
use edificio_core::{ClientConfig, Role, StoredSession, TokenStore, UserProfile};
use edificio_http::types::{AuthPayload, LoginRequest, RegisterRequest};
use edificio_http::{ApiClient, ClientError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Outcome of a successful sign-in
#[derive(Debug, Clone, PartialEq)]
pub struct SignedIn {
    pub user: UserProfile,
    /// Server confirmation, e.g. "Login exitoso"
    pub message: Option<String>,
}

/// Register/login/logout/profile operations bound to one token store
#[derive(Clone)]
pub struct SessionService {
    client: ApiClient,
    access_token_ttl: chrono::Duration,
}

impl SessionService {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            access_token_ttl: chrono::Duration::days(7),
        }
    }

    /// Build the client and service from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured base URL is unusable
    pub fn from_config(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        let client = ApiClient::from_config(config, store)?;
        Ok(Self::new(client).with_access_token_ttl(config.session.access_token_ttl()))
    }

    /// Lifetime recorded with every persisted access token
    #[must_use]
    pub fn with_access_token_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub const fn client(&self) -> &ApiClient {
        &self.client
    }

    fn store(&self) -> &Arc<dyn TokenStore> {
        self.client.store()
    }

    /// Create an account and sign in with it
    pub async fn register(&self, request: &RegisterRequest) -> ServiceResult<SignedIn> {
        let result = self.client.register(request).await;
        self.sign_in(result, error_messages::REGISTER_FAILED)
    }

    /// Sign in with email and password
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<SignedIn> {
        let result = self.client.login(&LoginRequest::new(email, password)).await;
        self.sign_in(result, error_messages::LOGIN_FAILED)
    }

    /// Sign in with a Google ID token from the sign-in widget
    pub async fn login_with_google(&self, credential: &str) -> ServiceResult<SignedIn> {
        let result = self.client.login_with_google(credential).await;
        self.sign_in(result, error_messages::GOOGLE_LOGIN_FAILED)
    }

    /// Finish the Google redirect flow
    ///
    /// The backend redirects to `/auth/callback?access_token=..&refresh_token=..`.
    /// The tokens are stored, then verified to load the profile; if
    /// verification fails the store is cleared again.
    pub async fn complete_oauth_callback(&self, callback_url: &str) -> ServiceResult<SignedIn> {
        let (access_token, refresh_token) = parse_callback(callback_url).ok_or_else(|| {
            ServiceFailure::new(FailureKind::Rejected, error_messages::OAUTH_CALLBACK_INVALID)
        })?;

        self.persist(StoredSession::new(access_token, refresh_token, None))?;

        match self.verify().await {
            Ok(user) => {
                info!(user = user.id(), "Signed in through Google redirect");
                Ok(SignedIn {
                    user,
                    message: None,
                })
            }
            Err(failure) => {
                self.clear_local();
                Err(ServiceFailure {
                    message: error_messages::GOOGLE_LOGIN_FAILED.to_string(),
                    ..failure
                })
            }
        }
    }

    /// Validate the stored access token and cache the profile it belongs to
    ///
    /// Never refreshes. The store is left alone on failure; the caller
    /// decides whether to clear it.
    pub async fn verify(&self) -> ServiceResult<UserProfile> {
        let payload = self.client.verify().await.map_err(|e| {
            debug!("Token verification failed: {e}");
            ServiceFailure::from_client_error(&e, error_messages::PROFILE_FAILED)
        })?;

        self.replace_user(&payload.user)?;
        Ok(payload.user)
    }

    /// Fetch the profile and replace the cached copy
    pub async fn get_profile(&self) -> ServiceResult<UserProfile> {
        let payload = self
            .client
            .profile()
            .await
            .map_err(|e| ServiceFailure::from_client_error(&e, error_messages::PROFILE_FAILED))?;

        self.replace_user(&payload.user)?;
        Ok(payload.user)
    }

    /// Notify the server, then clear local state whatever the outcome
    pub async fn logout(&self) {
        if let Err(e) = self.client.logout().await {
            warn!("Logout notification failed: {e}");
        }
        self.clear_local();
        info!("Signed out");
    }

    /// Drop the local session without contacting the server
    pub fn clear_local(&self) {
        if let Err(e) = self.store().clear() {
            error!("Failed to clear token store: {e}");
        }
    }

    /// Token present in the store; no network call
    pub fn is_authenticated(&self) -> bool {
        self.store().get().has_access_token()
    }

    pub fn current_user(&self) -> Option<UserProfile> {
        self.store().get().user
    }

    pub fn access_token(&self) -> Option<String> {
        self.store().get().access_token
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.current_user().is_some_and(|user| user.has_role(role))
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(&Role::Admin)
    }

    /// Where the browser goes to start Google sign-in
    pub fn google_login_url(&self) -> String {
        self.client.google_login_url()
    }

    fn sign_in(
        &self,
        result: Result<AuthPayload, ClientError>,
        fallback: &str,
    ) -> ServiceResult<SignedIn> {
        let payload = result.map_err(|e| {
            debug!("Sign-in rejected: {e}");
            ServiceFailure::from_client_error(&e, fallback)
        })?;

        self.persist(StoredSession::new(
            payload.access_token,
            payload.refresh_token,
            Some(payload.user.clone()),
        ))?;

        info!(user = payload.user.id(), "Signed in");
        Ok(SignedIn {
            user: payload.user,
            message: payload.message,
        })
    }

    fn replace_user(&self, user: &UserProfile) -> ServiceResult<()> {
        let current = self.store().get();
        if current.user.as_ref() == Some(user) {
            return Ok(());
        }
        self.store()
            .set(&StoredSession {
                user: Some(user.clone()),
                ..current
            })
            .map_err(|e| storage_failure(&e))
    }

    fn persist(&self, session: StoredSession) -> ServiceResult<()> {
        let session = session.expires_at(Utc::now() + self.access_token_ttl);
        self.store().set(&session).map_err(|e| storage_failure(&e))
    }
}

fn storage_failure(error: &edificio_core::StoreError) -> ServiceFailure {
    error!("Failed to persist session: {error}");
    ServiceFailure::new(
        FailureKind::Storage,
        "No se pudo guardar la sesión en este dispositivo",
    )
}

/// Tokens carried by the OAuth redirect; the access token is required
fn parse_callback(callback_url: &str) -> Option<(String, Option<String>)> {
    let url = Url::parse(callback_url)
        .or_else(|_| Url::parse("http://localhost").and_then(|base| base.join(callback_url)))
        .ok()?;

    let mut access_token = None;
    let mut refresh_token = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "access_token" if !value.is_empty() => access_token = Some(value.into_owned()),
            "refresh_token" if !value.is_empty() => refresh_token = Some(value.into_owned()),
            _ => {}
        }
    }

    access_token.map(|token| (token, refresh_token))
}
