//! OpenWeather API client.

use std::time::Duration;

use tracing::instrument;
use weatherbot_core::{with_retry, OpenWeatherConfig, RetryConfig, TemperatureUnit};

use crate::types::*;

const GEOCODING_PATH: &str = "/geo/1.0/direct";
const CURRENT_WEATHER_PATH: &str = "/data/2.5/weather";
const USER_AGENT: &str = concat!("weatherbot/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    units: TemperatureUnit,
    language: String,
    retry: RetryConfig,
}

impl OpenWeatherClient {
    pub fn new(config: &OpenWeatherConfig) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            units: config.units,
            language: config.language.clone(),
            retry: RetryConfig::with_max_retries(config.max_retries),
        })
    }

    /// Unit that `current_weather` temperatures are reported in
    pub fn units(&self) -> TemperatureUnit {
        self.units
    }

    /// Resolve a place name to coordinates; the best match wins.
    #[instrument(skip(self), level = "info")]
    pub async fn coordinates(&self, city: &str) -> Result<Coordinates, WeatherError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(WeatherError::InvalidRequest("empty place name".to_string()));
        }

        let query = [
            ("q", city.to_string()),
            ("limit", "1".to_string()),
            ("appid", self.api_key.clone()),
        ];

        let entries: Vec<GeoEntry> = self.get_json(GEOCODING_PATH, &query).await?;

        let coords = entries
            .into_iter()
            .next()
            .map(|entry| entry.into_coordinates(&self.language))
            .ok_or_else(|| WeatherError::LocationNotFound(city.to_string()))?;

        tracing::debug!(
            "Geocoded {:?} to {} ({}, {})",
            city,
            coords.name,
            coords.lat,
            coords.lon
        );
        Ok(coords)
    }

    /// Current conditions at the given point.
    #[instrument(skip(self), level = "info")]
    pub async fn current_weather(&self, lat: f64, lon: f64) -> Result<CurrentWeather, WeatherError> {
        let query = [
            ("lat", lat.to_string()),
            ("lon", lon.to_string()),
            ("appid", self.api_key.clone()),
            ("units", self.units.api_units().to_string()),
            ("lang", self.language.clone()),
        ];

        let resp: WeatherResponse = self.get_json(CURRENT_WEATHER_PATH, &query).await?;
        Ok(CurrentWeather::from(resp))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let url = format!("{}{}", self.base_url, path);

        let response = with_retry(&self.retry, || self.client.get(&url).query(query).send()).await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| WeatherError::Parse(e.without_url().to_string()));
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(WeatherError::RateLimited(retry_after));
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&text)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or(text);

        tracing::warn!("OpenWeather returned {}: {}", status, message);

        match status.as_u16() {
            401 => Err(WeatherError::InvalidApiKey),
            404 => Err(WeatherError::LocationNotFound(message)),
            400 => Err(WeatherError::InvalidRequest(message)),
            code if status.is_server_error() => Err(WeatherError::ServiceUnavailable(code)),
            code => Err(WeatherError::Api {
                status: code,
                message,
            }),
        }
    }
}
