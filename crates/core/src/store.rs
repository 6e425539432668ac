//! Durable client-side session storage
//!
//! The store keeps an opaque access token, a refresh token and the cached
//! profile. It never inspects token contents and never enforces expiry: the
//! expiry timestamp is recorded for whoever persists the token and reads it
//! back.

use crate::error::StoreError;
use crate::profile::UserProfile;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};

/// Snapshot of everything the store holds; every field may be absent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredSession {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user: Option<UserProfile>,
    pub access_expires_at: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        user: Option<UserProfile>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token,
            user,
            access_expires_at: None,
        }
    }

    #[must_use]
    pub fn expires_at(mut self, expires_at: DateTime<Utc>) -> Self {
        self.access_expires_at = Some(expires_at);
        self
    }

    pub const fn has_access_token(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Persistent storage for the session tokens and profile
///
/// Writers always replace the whole session; there is no partial update.
pub trait TokenStore: Send + Sync {
    /// Read the current session, absent fields included
    fn get(&self) -> StoredSession;

    /// Replace the stored session
    fn set(&self, session: &StoredSession) -> Result<(), StoreError>;

    /// Remove every stored field
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-local store, the equivalent of a tab-scoped storage area
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    session: RwLock<StoredSession>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with a session
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> StoredSession {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, session: &StoredSession) -> Result<(), StoreError> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = session.clone();
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = StoredSession::default();
        Ok(())
    }
}

/// JSON-file store with application-namespaced keys
///
/// The document at `<dir>/<namespace>_session.json` looks like
/// `{"edificio_token": "...", "edificio_refresh_token": "...",
/// "edificio_user": {...}, "edificio_token_expires": "..."}`.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    namespace: String,
    lock: RwLock<()>,
}

impl FileTokenStore {
    pub fn new(dir: impl AsRef<Path>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        let path = dir.as_ref().join(format!("{namespace}_session.json"));
        Self {
            path,
            namespace,
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}_{suffix}", self.namespace)
    }

    fn read_document(&self) -> Option<Map<String, Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read session file: {e}");
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(path = %self.path.display(), "Ignoring corrupt session file: {e}");
                None
            }
        }
    }

    fn string_field(&self, document: &Map<String, Value>, suffix: &str) -> Option<String> {
        document
            .get(&self.key(suffix))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let content = serde_json::to_vec_pretty(document)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, content).map_err(|e| StoreError::io(&tmp_path, e))?;
        std::fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::io(&self.path, e))
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> StoredSession {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let Some(document) = self.read_document() else {
            return StoredSession::default();
        };

        let user = document.get(&self.key("user")).and_then(|value| {
            serde_json::from_value::<UserProfile>(value.clone())
                .map_err(|e| warn!("Ignoring unreadable cached profile: {e}"))
                .ok()
        });

        let access_expires_at = self
            .string_field(&document, "token_expires")
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|expires| expires.with_timezone(&Utc));

        StoredSession {
            access_token: self.string_field(&document, "token"),
            refresh_token: self.string_field(&document, "refresh_token"),
            user,
            access_expires_at,
        }
    }

    fn set(&self, session: &StoredSession) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut document = Map::new();
        if let Some(token) = &session.access_token {
            document.insert(self.key("token"), Value::String(token.clone()));
        }
        if let Some(token) = &session.refresh_token {
            document.insert(self.key("refresh_token"), Value::String(token.clone()));
        }
        if let Some(user) = &session.user {
            document.insert(self.key("user"), serde_json::to_value(user)?);
        }
        if let Some(expires) = session.access_expires_at {
            document.insert(self.key("token_expires"), Value::String(expires.to_rfc3339()));
        }

        self.write_document(&document)?;
        debug!(path = %self.path.display(), "Session persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }
}
