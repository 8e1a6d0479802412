use anyhow::Result;
use tokio_util::sync::CancellationToken;
use weatherbot_core::ConfigError;

#[tokio::main]
async fn main() -> Result<()> {
    weatherbot_core::init()?;

    let (config, _validation) = weatherbot_core::Config::load_validated().inspect_err(|e| {
        if let Some(config_error) = e.downcast_ref::<ConfigError>() {
            tracing::error!("{}", config_error.user_message());
        }
    })?;
    tracing::info!("Configuration loaded from {}", config.config_dir.display());

    let app = weatherbot_bot::App::new(&config).inspect_err(|e| {
        tracing::error!("{}", e.user_message());
    })?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        tracing::info!("Shutdown requested");
        shutdown.cancel();
    });

    app.run(cancel).await.inspect_err(|e| {
        tracing::error!("{}", e.user_message());
    })?;

    tracing::info!("Weatherbot stopped");
    Ok(())
}
