use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weatherbot_core::{NetworkError, ReqwestErrorExt, TemperatureUnit};

/// A geocoded place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Place name, localized when the provider has one for the configured language
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub country: Option<String>,
    pub state: Option<String>,
}

/// Current conditions at a point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentWeather {
    /// In the unit the client was configured with
    pub temperature: f64,
    pub feels_like: Option<f64>,
    pub humidity: Option<u8>,
    pub description: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl CurrentWeather {
    /// Temperature rounded half away from zero
    pub fn rounded_temperature(&self) -> i64 {
        round_temperature(self.temperature)
    }
}

/// Round half away from zero; `-0.4` becomes `0`, never `-0`.
pub fn round_temperature(value: f64) -> i64 {
    value.round() as i64
}

/// `22°C`, `-3°F`, `280K`
pub fn format_temperature(value: f64, unit: TemperatureUnit) -> String {
    format!("{}{}", round_temperature(value), unit.symbol())
}

/// Geocoding API entry (`/geo/1.0/direct`)
#[derive(Debug, Deserialize)]
pub(crate) struct GeoEntry {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub local_names: Option<HashMap<String, String>>,
}

impl GeoEntry {
    pub(crate) fn into_coordinates(self, language: &str) -> Coordinates {
        let name = self
            .local_names
            .as_ref()
            .and_then(|names| names.get(language))
            .cloned()
            .unwrap_or(self.name);

        Coordinates {
            name,
            lat: self.lat,
            lon: self.lon,
            country: self.country,
            state: self.state,
        }
    }
}

/// Current weather API response (`/data/2.5/weather`)
#[derive(Debug, Deserialize)]
pub(crate) struct WeatherResponse {
    pub main: MainBlock,
    #[serde(default)]
    pub weather: Vec<ConditionBlock>,
    #[serde(default)]
    pub dt: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MainBlock {
    pub temp: f64,
    #[serde(default)]
    pub feels_like: Option<f64>,
    #[serde(default)]
    pub humidity: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConditionBlock {
    #[serde(default)]
    pub description: Option<String>,
}

impl From<WeatherResponse> for CurrentWeather {
    fn from(resp: WeatherResponse) -> Self {
        Self {
            temperature: resp.main.temp,
            feels_like: resp.main.feels_like,
            humidity: resp.main.humidity,
            description: resp.weather.into_iter().find_map(|c| c.description),
            observed_at: resp.dt.and_then(|ts| DateTime::from_timestamp(ts, 0)),
        }
    }
}

/// Error body returned with non-2xx statuses: `{"cod": 401, "message": "..."}`
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// Weather provider errors
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    #[error("Service unavailable ({0})")]
    ServiceUnavailable(u16),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for WeatherError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the API key.
        WeatherError::Network(e.without_url().into_network_error())
    }
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(e) => e.user_message(),
            Self::LocationNotFound(_) => "Location not found. Check the name and try again.",
            Self::InvalidApiKey => "Weather API key is invalid. Check settings.",
            Self::RateLimited(_) => "Too many weather requests. Please wait a moment.",
            Self::ServiceUnavailable(_) => "Weather service unavailable. Please try again later.",
            Self::InvalidRequest(_) => "The weather request was rejected.",
            Self::Api { .. } => "Weather service error. Please try again.",
            Self::Parse(_) => "Unexpected answer from the weather service.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::RateLimited(_) | Self::ServiceUnavailable(_) => true,
            _ => false,
        }
    }
}
