//! Edificio core types and utilities
//!
//! Shared by the HTTP client, the session layer and the CLI shell: the cached
//! user profile, the persistent token store, client configuration and
//! tracing setup.

pub mod config;
pub mod error;
pub mod profile;
pub mod store;
pub mod tracing;

pub use config::{ApiConfig, ClientConfig, OAuthConfig, SessionConfig, StorageConfig};
pub use error::{ConfigError, StoreError};
pub use profile::{Role, UserProfile};
pub use store::{FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};
