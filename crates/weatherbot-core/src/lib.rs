pub mod config;
pub mod error;
pub mod retry;

pub use config::{
    Config, OpenWeatherConfig, StorageConfig, TelegramConfig, TemperatureUnit, ValidationResult,
};
pub use error::{ConfigError, NetworkError, ReqwestErrorExt, StorageError};
pub use retry::{with_retry, RetryConfig, RetryDecision};

use anyhow::Result;

/// Initialize logging for the bot process.
///
/// Honors `RUST_LOG`; falls back to `info`.
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::info!("Weatherbot core initialized");
    Ok(())
}
