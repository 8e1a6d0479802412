//! Telegram-specific error types.

use std::time::Duration;

use thiserror::Error;
use weatherbot_core::{NetworkError, ReqwestErrorExt};

#[derive(Error, Debug)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Bot token rejected")]
    Unauthorized,

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Another getUpdates consumer or an active webhook
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for TelegramError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the bot token.
        TelegramError::Network(e.without_url().into_network_error())
    }
}

impl TelegramError {
    pub(crate) fn from_api(code: u16, description: String, retry_after: Option<u64>) -> Self {
        match code {
            401 => Self::Unauthorized,
            409 => Self::Conflict(description),
            429 => Self::RateLimited(retry_after.unwrap_or(5)),
            _ => Self::Api { code, description },
        }
    }

    /// Whether polling can continue after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::Unauthorized => "Telegram rejected the bot token. Check telegram.bot_token.",
            Self::RateLimited(_) => "Telegram is rate limiting the bot. Please wait.",
            Self::Conflict(_) => {
                "Another process or a webhook is consuming updates for this bot."
            }
            Self::Api { .. } => "Telegram returned an error.",
            Self::Parse(_) => "Unexpected answer from Telegram.",
        }
    }

    /// Server-requested pause before the next call
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(secs) => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_mapping() {
        assert!(matches!(
            TelegramError::from_api(401, "Unauthorized".into(), None),
            TelegramError::Unauthorized
        ));
        assert!(matches!(
            TelegramError::from_api(429, "Too Many Requests".into(), Some(17)),
            TelegramError::RateLimited(17)
        ));
        assert!(matches!(
            TelegramError::from_api(400, "Bad Request: chat not found".into(), None),
            TelegramError::Api { code: 400, .. }
        ));
    }

    #[test]
    fn test_retry_after() {
        assert_eq!(
            TelegramError::RateLimited(3).retry_after(),
            Some(Duration::from_secs(3))
        );
        assert_eq!(TelegramError::Unauthorized.retry_after(), None);
    }

    #[test]
    fn test_classification() {
        assert!(TelegramError::Unauthorized.is_fatal());
        assert!(!TelegramError::Conflict("webhook".into()).is_fatal());
        assert!(!TelegramError::RateLimited(1).is_fatal());
    }

    #[test]
    fn test_user_message() {
        assert!(TelegramError::Unauthorized.user_message().contains("bot token"));
        assert_eq!(
            TelegramError::Network(NetworkError::Timeout).user_message(),
            NetworkError::Timeout.user_message()
        );
    }
}
