//! Configuration loading for the CLI

use anyhow::{Context, Result};
use edificio_core::ClientConfig;
use std::path::{Path, PathBuf};

/// Values given on the command line, applied over file and environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub state_dir: Option<PathBuf>,
    pub api_url: Option<String>,
}

pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(path).with_context(|| match path {
        Some(path) => format!("Failed to load configuration from {}", path.display()),
        None => "Failed to load configuration".to_string(),
    })?;

    if let Some(state_dir) = overrides.state_dir {
        config.storage.state_dir = state_dir;
    }
    if let Some(api_url) = overrides.api_url {
        config.api.base_url = api_url;
        config.validate().context("Invalid --api-url")?;
    }

    Ok(config)
}
