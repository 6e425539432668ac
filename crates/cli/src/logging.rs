use edificio_core::tracing::{InstrumentationConfig, init_tracing};
use tracing::Level;

/// Initialize logging for the CLI
///
/// The `--log-level` flag replaces the configured level; `RUST_LOG` still
/// wins over both.
pub fn init_logging(level: Option<Level>, config: &InstrumentationConfig) {
    let mut config = config.clone();
    if let Some(level) = level {
        config.log_level = level.as_str().to_lowercase();
    }
    init_tracing(&config);
}
