pub mod config;
pub mod error;

pub use config::{
    BatchSettings, Config, LoggingConfig, RetrySettings, TemperatureUnit, ValidationResult,
    WeatherConfig,
};
pub use error::{AppError, ConfigError};

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` (normally `logging.filter`
/// from the config file) is used when it is unset or unparsable.
pub fn init_logging(default_filter: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Wasatch weather initialized");
    Ok(())
}
