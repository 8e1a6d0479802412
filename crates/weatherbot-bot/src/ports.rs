//! Seams between the conversation logic and the outside services.

use std::sync::Arc;

use async_trait::async_trait;
use weatherbot_core::TemperatureUnit;
use weatherbot_telegram::{OutgoingMessage, TelegramClient, TelegramError};
use weatherbot_weather::{Coordinates, CurrentWeather, OpenWeatherClient, WeatherError};

/// Weather data source
#[async_trait]
pub trait WeatherLookup: Send + Sync {
    async fn coordinates(&self, place: &str) -> Result<Coordinates, WeatherError>;

    async fn current_weather(&self, at: &Coordinates) -> Result<CurrentWeather, WeatherError>;

    /// Unit of the temperatures returned by `current_weather`
    fn units(&self) -> TemperatureUnit;
}

/// Delivery of bot answers
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, message: &OutgoingMessage) -> Result<(), TelegramError>;
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    async fn coordinates(&self, place: &str) -> Result<Coordinates, WeatherError> {
        OpenWeatherClient::coordinates(self, place).await
    }

    async fn current_weather(&self, at: &Coordinates) -> Result<CurrentWeather, WeatherError> {
        OpenWeatherClient::current_weather(self, at.lat, at.lon).await
    }

    fn units(&self) -> TemperatureUnit {
        OpenWeatherClient::units(self)
    }
}

#[async_trait]
impl ReplySender for TelegramClient {
    async fn send_reply(&self, message: &OutgoingMessage) -> Result<(), TelegramError> {
        self.send_message(message).await.map(|_| ())
    }
}

#[async_trait]
impl<T: WeatherLookup + ?Sized> WeatherLookup for Arc<T> {
    async fn coordinates(&self, place: &str) -> Result<Coordinates, WeatherError> {
        (**self).coordinates(place).await
    }

    async fn current_weather(&self, at: &Coordinates) -> Result<CurrentWeather, WeatherError> {
        (**self).current_weather(at).await
    }

    fn units(&self) -> TemperatureUnit {
        (**self).units()
    }
}

#[async_trait]
impl<T: ReplySender + ?Sized> ReplySender for Arc<T> {
    async fn send_reply(&self, message: &OutgoingMessage) -> Result<(), TelegramError> {
        (**self).send_reply(message).await
    }
}
