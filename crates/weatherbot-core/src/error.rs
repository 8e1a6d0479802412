//! Shared error types for the bot.
//!
//! Transport crates keep their own error enums (`WeatherError`,
//! `TelegramError`) and the bot crate wraps them all in its `AppError`.
//! The types here cover what every crate needs: HTTP failures,
//! configuration and local storage.

use thiserror::Error;

/// Network-related errors (HTTP, connectivity).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Client setup failed: {0}")]
    ClientSetup(String),
}

impl NetworkError {
    pub fn user_message(&self) -> &'static str {
        match self {
            NetworkError::ConnectionFailed(_) => {
                "Unable to connect. Check your internet connection."
            }
            NetworkError::Timeout => "The request timed out. Please try again.",
            NetworkError::ServerError { status, .. } if *status >= 500 => {
                "The server is experiencing issues. Please try again later."
            }
            NetworkError::ServerError { .. } => "The request failed. Please try again.",
            NetworkError::InvalidResponse(_) => {
                "Received an unexpected response. Please try again."
            }
            NetworkError::ClientSetup(_) => "HTTP client could not be created.",
        }
    }

    /// Timeouts, dropped connections and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            NetworkError::Timeout | NetworkError::ConnectionFailed(_) => true,
            NetworkError::ServerError { status, .. } => *status >= 500,
            NetworkError::InvalidResponse(_) | NetworkError::ClientSetup(_) => false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}

/// Local storage errors (persisted city store).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Data corruption detected in {path}: {message}")]
    Corruption { path: String, message: String },
}

impl StorageError {
    pub fn user_message(&self) -> &'static str {
        match self {
            StorageError::Read { .. } => "Saved data could not be read.",
            StorageError::Write { .. } => "Saved data could not be written.",
            StorageError::Corruption { .. } => {
                "Saved data is corrupted. Fix or remove the file and restart."
            }
        }
    }
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_connect() {
            NetworkError::ConnectionFailed(self.to_string())
        } else if self.is_builder() {
            NetworkError::ClientSetup(self.to_string())
        } else if self.is_decode() {
            NetworkError::InvalidResponse(self.to_string())
        } else if let Some(status) = self.status() {
            NetworkError::ServerError {
                status: status.as_u16(),
                message: self.to_string(),
            }
        } else {
            NetworkError::ConnectionFailed(self.to_string())
        }
    }
}
