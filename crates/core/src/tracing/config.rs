//! Configuration for tracing

use serde::{Deserialize, Serialize};

/// Main instrumentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Service name attached to log lines
    pub service_name: String,
    /// Log level filter (e.g., "info", "debug", "edificio_http=trace")
    pub log_level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "edificio".to_string(),
            log_level: "info".to_string(),
            json: false,
        }
    }
}
