//! Edificio HTTP client
//!
//! Every request carries the stored access token as a bearer credential. A
//! 401 triggers at most one silent refresh-and-retry per logical request;
//! see [`refresh`] for the exact policy.

pub mod auth;
pub mod error;
mod refresh;

use bytes::Bytes;
use crate::types::ErrorBody;
use edificio_core::{ClientConfig, MemoryTokenStore, TokenStore};
use error::ClientError;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Callback fired after a failed refresh has cleared the token store
pub type SessionExpiredHook = Arc<dyn Fn() + Send + Sync>;

/// Edificio API client
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    refresh_gate: Option<tokio::sync::Mutex<()>>,
    session_expired: RwLock<Option<SessionExpiredHook>>,
}

/// Raw response of a successful request
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] if the body does not match `T`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ClientError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Whether a 401 may trigger the refresh policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryPolicy {
    RefreshOnce,
    Never,
}

impl ApiClient {
    /// Create a new client builder
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Build a client from loaded configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed
    pub fn from_config(
        config: &ClientConfig,
        store: Arc<dyn TokenStore>,
    ) -> Result<Self, ClientError> {
        let mut builder = Self::builder()
            .base_url(&config.api.base_url)
            .token_store(store)
            .user_agent(&config.api.user_agent)
            .single_flight_refresh(config.session.single_flight_refresh);
        if let Some(timeout) = config.api.timeout() {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Token store shared with the session layer
    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.store
    }

    /// Install or replace the session-expired callback
    pub fn set_session_expired_hook(&self, hook: SessionExpiredHook) {
        *self
            .inner
            .session_expired
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    /// Send a request under the refresh-once policy
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Request`] when no response arrived, a status
    /// error for any non-2xx answer, and [`ClientError::SessionExpired`] when
    /// a 401 could not be recovered by refreshing the access token
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<HeaderMap>,
    ) -> Result<ApiResponse, ClientError> {
        self.dispatch(method, path, body, headers, RetryPolicy::RefreshOnce)
            .await
    }

    /// Send a request with the refresh policy disabled
    ///
    /// # Errors
    ///
    /// Same as [`Self::request`], except a 401 is always returned as
    /// [`ClientError::AuthenticationFailed`]
    pub async fn request_without_refresh(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<HeaderMap>,
    ) -> Result<ApiResponse, ClientError> {
        self.dispatch(method, path, body, headers, RetryPolicy::Never)
            .await
    }

    /// Execute a request and parse its JSON body
    ///
    /// # Errors
    ///
    /// Same as [`Self::request`], plus [`ClientError::Serialization`] when
    /// the body does not parse as `T`
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        self.request(method, path, body, None).await?.json()
    }

    /// Execute a request without the refresh policy and parse its JSON body
    ///
    /// # Errors
    ///
    /// Same as [`Self::request_without_refresh`], plus
    /// [`ClientError::Serialization`]
    pub async fn execute_without_refresh<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, ClientError> {
        self.request_without_refresh(method, path, body, None)
            .await?
            .json()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<HeaderMap>,
        policy: RetryPolicy,
    ) -> Result<ApiResponse, ClientError> {
        let token = self.inner.store.get().access_token;
        let response = self
            .send_once(&method, path, body, headers.as_ref(), token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED || !policy.allows_refresh() {
            return into_api_response(response).await;
        }

        // From here on the request counts as retried: it is sent at most
        // once more, whatever the second answer is.
        let rejected = read_error_body(response).await;
        let new_token = self
            .refresh_after_unauthorized(token.as_deref(), rejected)
            .await?;

        debug!(%method, path, "Retrying request with refreshed access token");
        let retried = self
            .send_once(&method, path, body, headers.as_ref(), Some(&new_token))
            .await?;
        into_api_response(retried).await
    }

    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&Value>,
        headers: Option<&HeaderMap>,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut headers = headers.cloned().unwrap_or_default();
        if let Some(token) = token {
            // Replaces any caller-supplied credential
            headers.insert(header::AUTHORIZATION, bearer(token)?);
        }

        let mut request = self
            .inner
            .client
            .request(method.clone(), self.url(path))
            .headers(headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        debug!(%method, path, authenticated = token.is_some(), "Sending request");
        Ok(request.send().await?)
    }
}

async fn into_api_response(response: reqwest::Response) -> Result<ApiResponse, ClientError> {
    let status = response.status();
    if status.is_success() {
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    } else {
        let body = read_error_body(response).await;
        Err(ClientError::from_status(status, body))
    }
}

async fn read_error_body(response: reqwest::Response) -> ErrorBody {
    let status = response.status();
    response.bytes().await.map_or_else(
        |_| ErrorBody::from_text(status.canonical_reason().unwrap_or_default()),
        |bytes| ErrorBody::parse(&bytes),
    )
}

fn bearer(token: &str) -> Result<HeaderValue, ClientError> {
    HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| ClientError::InvalidPayload("token is not a valid header value".into()))
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    base_url: Option<String>,
    store: Option<Arc<dyn TokenStore>>,
    timeout: Option<Duration>,
    user_agent: Option<String>,
    single_flight_refresh: bool,
    on_session_expired: Option<SessionExpiredHook>,
}

impl ApiClientBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the token store; defaults to an empty in-memory store
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Coalesce concurrent refreshes behind one in-flight call
    pub fn single_flight_refresh(mut self, enabled: bool) -> Self {
        self.single_flight_refresh = enabled;
        self
    }

    /// Callback fired once the store has been cleared after a failed refresh
    pub fn on_session_expired(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_session_expired = Some(Arc::new(hook));
        self
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the base URL is missing or
    /// not an absolute http(s) URL
    pub fn build(self) -> Result<ApiClient, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Configuration("base_url is required".into()))?;

        let parsed = Url::parse(&base_url)
            .map_err(|e| ClientError::Configuration(format!("invalid base_url {base_url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Configuration(format!(
                "base_url must be http or https, got {}",
                parsed.scheme()
            )));
        }

        // Ensure base_url ends without a trailing slash
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        client_builder = client_builder.user_agent(
            self.user_agent
                .unwrap_or_else(|| concat!("edificio-client/", env!("CARGO_PKG_VERSION")).into()),
        );

        let client = client_builder.build()?;

        Ok(ApiClient {
            inner: Arc::new(Inner {
                client,
                base_url,
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(MemoryTokenStore::new())),
                refresh_gate: self.single_flight_refresh.then(|| tokio::sync::Mutex::new(())),
                session_expired: RwLock::new(self.on_session_expired),
            }),
        })
    }
}
