//! Edificio HTTP client
//!
//! Typed access to the `/api/auth/*` endpoints on top of a reqwest client that
//! attaches the stored bearer token and refreshes it once on 401.

pub mod client;
pub mod types;

pub use client::error::ClientError;
pub use client::{ApiClient, ApiClientBuilder, ApiResponse, SessionExpiredHook};
pub use reqwest::{Method, StatusCode};
