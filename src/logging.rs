/// Tracing subscriber setup driven by the `[logging]` section
use crate::config::LoggingConfig;
use crate::error::{RelevoError, RelevoResult};
use tracing_subscriber::EnvFilter;

/// Install a global subscriber; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &LoggingConfig) -> RelevoResult<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match config.format.as_str() {
        "json" => builder.json().try_init(),
        _ => builder.try_init(),
    };
    installed.map_err(|e| RelevoError::internal(format!("Failed to initialize logging: {}", e)))?;

    tracing::info!("Logging initialized at level: {}", config.level);
    Ok(())
}
