//! Client configuration
//!
//! Read once at startup from defaults, an optional config file and
//! `EDIFICIO_*` environment variables (`EDIFICIO_API__BASE_URL`,
//! `EDIFICIO_SESSION__ACCESS_TOKEN_TTL_DAYS`, ...). Nothing here changes at
//! runtime.

use crate::error::ConfigError;
use crate::tracing::config::InstrumentationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variable overriding the state directory
pub const STATE_DIR_ENV: &str = "EDIFICIO_STATE_DIR";

/// Main client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// REST API connection settings
    pub api: ApiConfig,

    /// Third-party sign-in settings
    pub oauth: OAuthConfig,

    /// Session lifecycle settings
    pub session: SessionConfig,

    /// Where the token store lives
    pub storage: StorageConfig,

    /// Log filter settings
    pub logging: InstrumentationConfig,
}

/// REST API connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the REST API
    pub base_url: String,

    /// Request timeout in seconds (0 disables the timeout)
    pub timeout_secs: u64,

    /// User agent sent with every request
    pub user_agent: String,
}

/// Third-party sign-in settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Google OAuth client identifier used by the sign-in widget
    pub google_client_id: Option<String>,
}

/// Session lifecycle settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime recorded with a freshly persisted access token
    pub access_token_ttl_days: i64,

    /// Coalesce concurrent token refreshes into one call
    pub single_flight_refresh: bool,
}

/// Token store location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the session file
    pub state_dir: PathBuf,

    /// Prefix for every persisted key
    pub namespace: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            timeout_secs: 30,
            user_agent: concat!("edificio-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            access_token_ttl_days: 7,
            single_flight_refresh: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            namespace: "edificio".to_string(),
        }
    }
}

/// State directory from `EDIFICIO_STATE_DIR`, falling back to the system data dir
pub fn default_state_dir() -> PathBuf {
    std::env::var(STATE_DIR_ENV).map_or_else(
        |_| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("edificio")
        },
        PathBuf::from,
    )
}

impl ApiConfig {
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }
}

impl SessionConfig {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.access_token_ttl_days)
    }
}

impl ClientConfig {
    /// Load configuration from an optional file plus the environment
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting configuration fails validation
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("EDIFICIO")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the client relies on
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api.base_url).map_err(|e| {
            ConfigError::invalid(format!("api.base_url {:?}: {e}", self.api.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(format!(
                "api.base_url must be http or https, got {}",
                url.scheme()
            )));
        }

        if self.session.access_token_ttl_days <= 0 {
            return Err(ConfigError::invalid(
                "session.access_token_ttl_days must be positive",
            ));
        }

        if self.storage.namespace.trim().is_empty() {
            return Err(ConfigError::invalid("storage.namespace must not be empty"));
        }

        Ok(())
    }
}
