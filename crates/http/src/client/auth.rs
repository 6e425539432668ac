//! Authentication API client methods
//!
//! These only talk to the API. Persisting what they return is the session
//! layer's job, except for the access token written by the refresh policy.

use super::{ApiClient, ClientError, RetryPolicy};
use crate::types::{
    ApiEnvelope, AuthPayload, ErrorBody, GoogleLoginRequest, LoginRequest, ProfilePayload,
    RegisterRequest, VerifyPayload,
};
use edificio_core::StoredSession;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub const REGISTER_PATH: &str = "/api/auth/register";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const GOOGLE_EXCHANGE_PATH: &str = "/api/auth/google/user";
pub const GOOGLE_LOGIN_PATH: &str = "/api/auth/google/login";
pub const VERIFY_PATH: &str = "/api/auth/verify";
pub const LOGOUT_PATH: &str = "/api/auth/logout";
pub const PROFILE_PATH: &str = "/api/auth/profile";

impl ApiClient {
    /// Create an account
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthPayload, ClientError> {
        self.credential_exchange(REGISTER_PATH, request).await
    }

    /// Sign in with email and password
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, ClientError> {
        self.credential_exchange(LOGIN_PATH, request).await
    }

    /// Exchange a Google ID token for an Edificio session
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthPayload, ClientError> {
        let request = GoogleLoginRequest {
            id_token: id_token.to_string(),
        };
        self.credential_exchange(GOOGLE_EXCHANGE_PATH, &request).await
    }

    /// Check the stored access token against the server
    ///
    /// Never refreshes: a rejected token is reported as is.
    pub async fn verify(&self) -> Result<VerifyPayload, ClientError> {
        self.envelope::<(), _>(Method::GET, VERIFY_PATH, None, RetryPolicy::Never)
            .await
    }

    /// Fetch the signed-in person's profile
    pub async fn profile(&self) -> Result<ProfilePayload, ClientError> {
        self.envelope::<(), _>(Method::GET, PROFILE_PATH, None, RetryPolicy::RefreshOnce)
            .await
    }

    /// Tell the server the session is over
    ///
    /// Only the notification; the caller clears local state.
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.dispatch(Method::POST, LOGOUT_PATH, None, None, RetryPolicy::Never)
            .await?;
        Ok(())
    }

    /// Refresh the access token on demand and persist it
    ///
    /// Unlike the automatic policy, a failure here leaves the store alone.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let current = self.inner.store.get();
        let Some(refresh_token) = current.refresh_token.clone() else {
            return Err(ClientError::AuthenticationFailed {
                body: ErrorBody::from_text("no refresh token stored"),
            });
        };

        let access_token = self.refresh_access_token(&refresh_token).await?;
        self.inner.store.set(&StoredSession {
            access_token: Some(access_token.clone()),
            ..current
        })?;
        Ok(access_token)
    }

    /// Entry point of the browser redirect flow for Google sign-in
    pub fn google_login_url(&self) -> String {
        self.url(GOOGLE_LOGIN_PATH)
    }

    /// Sign-in style request, sent outside the refresh policy
    ///
    /// A 401 here means the credentials were rejected, whatever session may
    /// still be stored. The envelope's top-level `message` fills in for a
    /// payload that carries none.
    async fn credential_exchange<B>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<AuthPayload, ClientError>
    where
        B: Serialize + ?Sized,
    {
        let (mut payload, message): (AuthPayload, Option<String>) = self
            .envelope_with_message(Method::POST, path, Some(body), RetryPolicy::Never)
            .await?;
        payload.message = payload.message.or(message);
        Ok(payload)
    }

    async fn envelope<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        policy: RetryPolicy,
    ) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (data, _) = self.envelope_with_message(method, path, body, policy).await?;
        Ok(data)
    }

    async fn envelope_with_message<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        policy: RetryPolicy,
    ) -> Result<(T, Option<String>), ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body.map(serde_json::to_value).transpose()?;
        let response = self
            .dispatch(method, path, body.as_ref(), None, policy)
            .await?;
        response
            .json::<ApiEnvelope<T>>()?
            .into_parts(response.status)
    }
}
