//! Refresh-once policy for 401 responses
//!
//! A request rejected with 401 is retried at most once. Before the retry the
//! stored refresh token is exchanged for a new access token. When no refresh
//! token is stored, the 401 is returned as is. When the exchange fails, the
//! token store is cleared, the session-expired hook fires and the caller
//! receives [`ClientError::SessionExpired`].
//!
//! With single-flight refresh enabled, refreshes are serialized behind one
//! async mutex. A request that acquires it after another refresh already
//! replaced the access token reuses that token instead of refreshing again.
//! One that finds the store cleared by a failed refresh gets
//! [`ClientError::SessionExpired`] without a second refresh or hook call.

use super::{ApiClient, RetryPolicy, bearer};
use crate::client::error::ClientError;
use crate::types::{ApiEnvelope, ErrorBody, RefreshPayload};
use edificio_core::StoredSession;
use reqwest::header::{self, HeaderMap};
use reqwest::Method;
use serde_json::json;
use std::sync::PoisonError;
use tracing::{debug, error, info, warn};

pub const REFRESH_PATH: &str = "/api/auth/refresh";

impl ApiClient {
    /// Obtain a replacement access token after `stale_token` was rejected
    pub(super) async fn refresh_after_unauthorized(
        &self,
        stale_token: Option<&str>,
        rejected: ErrorBody,
    ) -> Result<String, ClientError> {
        let Some(gate) = &self.inner.refresh_gate else {
            return self.refresh_or_expire(rejected).await;
        };

        let _in_flight = gate.lock().await;
        match self.inner.store.get().access_token {
            Some(current) if Some(current.as_str()) != stale_token => {
                debug!("Access token already refreshed by a concurrent request");
                Ok(current)
            }
            None if stale_token.is_some() => {
                debug!("Session ended by a concurrent refresh");
                Err(ClientError::SessionExpired)
            }
            _ => self.refresh_or_expire(rejected).await,
        }
    }

    async fn refresh_or_expire(&self, rejected: ErrorBody) -> Result<String, ClientError> {
        let Some(refresh_token) = self.inner.store.get().refresh_token else {
            debug!("No refresh token stored; returning 401 to the caller");
            return Err(ClientError::AuthenticationFailed { body: rejected });
        };

        match self.refresh_access_token(&refresh_token).await {
            Ok(access_token) => {
                self.persist_access_token(&access_token)?;
                info!("Access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!("Token refresh failed, ending session: {e}");
                self.expire_session();
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// Exchange a refresh token for a new access token
    ///
    /// Sent outside the retry policy: a 401 here is final.
    pub(crate) async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<String, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, bearer(refresh_token)?);

        let response = self
            .send_once(
                &Method::POST,
                REFRESH_PATH,
                Some(&json!({})),
                Some(&headers),
                None,
            )
            .await?;
        let response = super::into_api_response(response).await?;
        let envelope: ApiEnvelope<RefreshPayload> = response.json()?;

        // The refresh endpoint does not always set `success`
        match envelope.data {
            Some(payload) if !payload.access_token.is_empty() => Ok(payload.access_token),
            _ => Err(ClientError::InvalidPayload(
                "refresh response carries no access_token".into(),
            )),
        }
    }

    /// Full overwrite keeping the refresh token, profile and expiry
    fn persist_access_token(&self, access_token: &str) -> Result<(), ClientError> {
        let current = self.inner.store.get();
        let session = StoredSession {
            access_token: Some(access_token.to_string()),
            ..current
        };
        self.inner.store.set(&session)?;
        Ok(())
    }

    /// Clear the store and notify whoever owns the session state
    pub(crate) fn expire_session(&self) {
        if let Err(e) = self.inner.store.clear() {
            error!("Failed to clear token store after session expiry: {e}");
        }

        let hook = self
            .inner
            .session_expired
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl RetryPolicy {
    pub(super) const fn allows_refresh(self) -> bool {
        matches!(self, Self::RefreshOnce)
    }
}
