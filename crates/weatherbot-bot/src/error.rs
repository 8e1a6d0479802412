//! Errors that stop the bot.

use thiserror::Error;
use weatherbot_core::StorageError;
use weatherbot_telegram::TelegramError;
use weatherbot_weather::WeatherError;

/// Startup or runtime failure of the whole bot.
///
/// Use `user_message()` for text that can be shown to an operator.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Telegram error: {0}")]
    Telegram(#[from] TelegramError),

    #[error("Update poller task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Storage(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Telegram(e) => e.user_message(),
            AppError::Task(_) => "The update poller stopped unexpectedly.",
        }
    }
}
