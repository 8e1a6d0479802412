use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `telegram.bot_token`.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";
/// Environment variable that overrides `openweather.api_key`.
pub const API_KEY_ENV: &str = "OPENWEATHER_API_KEY";

const PLACEHOLDER_PREFIX: &str = "YOUR_";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a one-line message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the persisted city store
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub openweather: OpenWeatherConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// Telegram Bot API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Token issued by @BotFather (overridable via TELEGRAM_BOT_TOKEN)
    #[serde(default = "default_bot_token")]
    pub bot_token: String,

    /// Bot API base URL
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,

    /// Long polling timeout passed to getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,

    /// Send answers as replies to the user's message
    #[serde(default = "default_true")]
    pub reply_to_message: bool,
}

impl TelegramConfig {
    /// Check if the token is set (not a placeholder)
    pub fn is_configured(&self) -> bool {
        !self.bot_token.is_empty() && !self.bot_token.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: default_bot_token(),
            api_url: default_telegram_api_url(),
            poll_timeout_secs: default_poll_timeout(),
            reply_to_message: true,
        }
    }
}

/// Temperature unit requested from the weather provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureUnit {
    /// Value of the OpenWeather `units` query parameter
    pub fn api_units(&self) -> &'static str {
        match self {
            Self::Celsius => "metric",
            Self::Fahrenheit => "imperial",
            Self::Kelvin => "standard",
        }
    }

    /// Suffix used when printing a temperature
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }
}

/// OpenWeather API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenWeatherConfig {
    /// API key (overridable via OPENWEATHER_API_KEY)
    #[serde(default = "default_api_key")]
    pub api_key: String,

    #[serde(default = "default_openweather_api_url")]
    pub api_url: String,

    #[serde(default)]
    pub units: TemperatureUnit,

    /// Language for weather descriptions
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for transient failures (timeouts, 5xx, 429)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl OpenWeatherConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_key.starts_with(PLACEHOLDER_PREFIX)
    }
}

impl Default for OpenWeatherConfig {
    fn default() -> Self {
        Self {
            api_key: default_api_key(),
            api_url: default_openweather_api_url(),
            units: TemperatureUnit::default(),
            language: default_language(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Where saved user cities live
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Keep saved cities across restarts (in-memory only when false)
    #[serde(default)]
    pub persist_cities: bool,

    /// Override for the cities file (defaults to `<config_dir>/user_cities.json`)
    #[serde(default)]
    pub cities_file: Option<PathBuf>,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("weatherbot")
}

fn default_bot_token() -> String {
    "YOUR_TELEGRAM_BOT_TOKEN".to_string()
}

fn default_api_key() -> String {
    "YOUR_OPENWEATHER_API_KEY".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_openweather_api_url() -> String {
    "https://api.openweathermap.org".to_string()
}

fn default_poll_timeout() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_language() -> String {
    "ru".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            telegram: TelegramConfig::default(),
            openweather: OpenWeatherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing,
    /// then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file, writing defaults if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let mut config = Self::default();
            if let Some(parent) = path.parent() {
                config.config_dir = parent.to_path_buf();
            }
            config.save_to(path)?;
            tracing::info!("Wrote default configuration to {}", path.display());
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let config = Self::load()?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Override secrets from the process environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override secrets using an arbitrary lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(BOT_TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.openweather.api_key = key.trim().to_string();
        }
    }

    /// File backing the user city store
    pub fn cities_path(&self) -> PathBuf {
        self.storage
            .cities_file
            .clone()
            .unwrap_or_else(|| self.config_dir.join("user_cities.json"))
    }

    /// Validate the configuration
    ///
    /// Returns a ValidationResult containing any errors or warnings.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if !self.telegram.is_configured() {
            result.add_error(
                "telegram.bot_token",
                format!("Bot token not configured (set {} or edit config.toml)", BOT_TOKEN_ENV),
            );
        } else if !self.telegram.bot_token.contains(':') {
            result.add_warning(
                "telegram.bot_token",
                "Token does not look like a Bot API token (expected <id>:<secret>)",
            );
        }

        if !self.openweather.is_configured() {
            result.add_error(
                "openweather.api_key",
                format!("API key not configured (set {} or edit config.toml)", API_KEY_ENV),
            );
        }

        self.validate_url(&self.telegram.api_url, "telegram.api_url", &mut result);
        self.validate_url(&self.openweather.api_url, "openweather.api_url", &mut result);

        if self.telegram.poll_timeout_secs == 0 {
            result.add_warning(
                "telegram.poll_timeout_secs",
                "Long polling disabled (0 seconds), updates will be short-polled",
            );
        } else if self.telegram.poll_timeout_secs > 600 {
            result.add_warning(
                "telegram.poll_timeout_secs",
                "Poll timeout is more than 10 minutes",
            );
        }

        if self.openweather.request_timeout_secs == 0 {
            result.add_error(
                "openweather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        }

        if self.openweather.max_retries > 10 {
            result.add_warning(
                "openweather.max_retries",
                "More than 10 retries will delay replies noticeably",
            );
        }

        if self.openweather.language.trim().is_empty() {
            result.add_warning("openweather.language", "Empty language, provider default applies");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("weatherbot");

        Ok(config_dir.join("config.toml"))
    }
}
