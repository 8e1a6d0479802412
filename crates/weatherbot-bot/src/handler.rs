//! Update dispatch.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use weatherbot_telegram::{Message, OutgoingMessage, Update};
use weatherbot_weather::WeatherError;

use crate::city_store::UserCities;
use crate::ports::{ReplySender, WeatherLookup};
use crate::replies;
use crate::request::Request;

pub struct Handler<W, S> {
    weather: W,
    sender: S,
    cities: UserCities,
    reply_to_message: bool,
}

impl<W: WeatherLookup, S: ReplySender> Handler<W, S> {
    pub fn new(weather: W, sender: S, cities: UserCities) -> Self {
        Self {
            weather,
            sender,
            cities,
            reply_to_message: true,
        }
    }

    /// Whether answers quote the user's message (on by default)
    pub fn reply_to_message(mut self, enabled: bool) -> Self {
        self.reply_to_message = enabled;
        self
    }

    pub fn cities(&self) -> &UserCities {
        &self.cities
    }

    /// Consume updates one at a time until the channel closes or `cancel` fires.
    pub async fn run(&self, mut updates: mpsc::Receiver<Update>, cancel: CancellationToken) {
        loop {
            let update = tokio::select! {
                _ = cancel.cancelled() => break,
                update = updates.recv() => match update {
                    Some(update) => update,
                    None => break,
                },
            };

            self.handle_update(update).await;
        }

        tracing::info!("Update handler stopped");
    }

    pub async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            tracing::debug!("Ignoring update {} without a message", update.update_id);
            return;
        };

        let Some(text) = self.respond(&message).await else {
            tracing::debug!("Ignoring message {} without text", message.message_id);
            return;
        };

        let mut outgoing = OutgoingMessage::new(message.chat.id, text);
        if self.reply_to_message {
            outgoing = outgoing.replying_to(message.message_id);
        }

        if let Err(e) = self.sender.send_reply(&outgoing).await {
            tracing::error!("Failed to reply in chat {}: {}", message.chat.id, e);
        }
    }

    /// Answer text for a message, `None` when the message needs no answer.
    pub async fn respond(&self, message: &Message) -> Option<String> {
        let request = Request::parse(message)?;
        let user_id = message
            .from
            .as_ref()
            .map(|user| user.id)
            .unwrap_or(message.chat.id);

        let reply = match request {
            Request::SetCity("") => replies::CITY_USAGE.to_string(),
            Request::SetCity(city) => {
                if let Err(e) = self.cities.set(user_id, city) {
                    tracing::error!("Failed to persist city for user {}: {}", user_id, e);
                }
                tracing::info!("User {} saved city {:?}", user_id, city);
                replies::city_saved(city)
            }
            Request::SavedCityWeather => match self.cities.get(user_id) {
                Some(city) => self.temperature_reply(&city).await,
                None => replies::NO_SAVED_CITY.to_string(),
            },
            Request::Help => replies::HELP.to_string(),
            Request::Unknown(_) => {
                tracing::info!(
                    "New command [{}] {}",
                    message.sender_label(),
                    message.text.as_deref().unwrap_or_default()
                );
                replies::UNKNOWN_COMMAND.to_string()
            }
            Request::Lookup(place) => {
                tracing::info!("[{}] {}", message.sender_label(), place);
                self.temperature_reply(place).await
            }
        };

        Some(reply)
    }

    async fn temperature_reply(&self, place: &str) -> String {
        let coordinates = match self.weather.coordinates(place).await {
            Ok(coordinates) => coordinates,
            Err(e) => {
                log_lookup_failure("Coordinates", place, &e);
                return replies::COORDINATES_FAILED.to_string();
            }
        };

        match self.weather.current_weather(&coordinates).await {
            Ok(weather) => replies::temperature(place, &weather, self.weather.units()),
            Err(e) => {
                log_lookup_failure("Weather", place, &e);
                replies::WEATHER_FAILED.to_string()
            }
        }
    }
}

/// Transient provider trouble is a warning; bad keys or requests need an operator.
fn log_lookup_failure(what: &str, place: &str, e: &WeatherError) {
    if e.is_retryable() || matches!(e, WeatherError::LocationNotFound(_)) {
        tracing::warn!("{} lookup for {:?} failed: {}", what, place, e);
    } else {
        tracing::error!("{} lookup for {:?} failed: {}", what, place, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use weatherbot_core::TemperatureUnit;
    use weatherbot_telegram::TelegramError;
    use weatherbot_weather::{Coordinates, CurrentWeather, WeatherError};

    #[derive(Default)]
    struct FakeWeather {
        temperatures: HashMap<String, f64>,
        broken_weather: bool,
        weather_calls: Mutex<usize>,
    }

    impl FakeWeather {
        fn with(places: &[(&str, f64)]) -> Self {
            Self {
                temperatures: places.iter().map(|(p, t)| (p.to_string(), *t)).collect(),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl WeatherLookup for FakeWeather {
        async fn coordinates(&self, place: &str) -> Result<Coordinates, WeatherError> {
            if !self.temperatures.contains_key(place) {
                return Err(WeatherError::LocationNotFound(place.to_string()));
            }
            Ok(Coordinates {
                name: place.to_string(),
                lat: 0.0,
                lon: 0.0,
                country: None,
                state: None,
            })
        }

        async fn current_weather(&self, at: &Coordinates) -> Result<CurrentWeather, WeatherError> {
            *self.weather_calls.lock() += 1;
            if self.broken_weather {
                return Err(WeatherError::ServiceUnavailable(503));
            }
            Ok(CurrentWeather {
                temperature: self.temperatures[&at.name],
                feels_like: None,
                humidity: None,
                description: None,
                observed_at: None,
            })
        }

        fn units(&self) -> TemperatureUnit {
            TemperatureUnit::Celsius
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<OutgoingMessage>>,
        fail: bool,
    }

    #[async_trait]
    impl ReplySender for RecordingSender {
        async fn send_reply(&self, message: &OutgoingMessage) -> Result<(), TelegramError> {
            self.sent.lock().push(message.clone());
            if self.fail {
                return Err(TelegramError::Api {
                    code: 400,
                    description: "Bad Request: chat not found".into(),
                });
            }
            Ok(())
        }
    }

    fn message(user_id: i64, text: &str) -> Message {
        let entities = if text.starts_with('/') {
            let len = text.split_whitespace().next().unwrap_or(text).encode_utf16().count();
            serde_json::json!([{"type": "bot_command", "offset": 0, "length": len}])
        } else {
            serde_json::json!([])
        };
        serde_json::from_value(serde_json::json!({
            "message_id": 10,
            "from": {"id": user_id, "first_name": "Test", "username": "tester"},
            "chat": {"id": 500 + user_id},
            "text": text,
            "entities": entities
        }))
        .unwrap()
    }

    fn handler(weather: FakeWeather) -> Handler<Arc<FakeWeather>, Arc<RecordingSender>> {
        Handler::new(
            Arc::new(weather),
            Arc::new(RecordingSender::default()),
            UserCities::in_memory(),
        )
    }

    #[tokio::test]
    async fn test_city_command_saves_city() {
        let handler = handler(FakeWeather::default());

        let reply = handler.respond(&message(1, "/city Омск")).await;

        assert_eq!(reply.as_deref(), Some("Город Омск сохранен"));
        assert_eq!(handler.cities().get(1).as_deref(), Some("Омск"));
    }

    #[tokio::test]
    async fn test_city_without_name_saves_nothing() {
        let handler = handler(FakeWeather::default());

        let reply = handler.respond(&message(1, "/city   ")).await;

        assert_eq!(reply.as_deref(), Some(replies::CITY_USAGE));
        assert!(handler.cities().is_empty());
    }

    #[tokio::test]
    async fn test_city_is_kept_when_saving_to_disk_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        let cities = UserCities::persistent(blocked.join("user_cities.json")).unwrap();
        // A plain file where the store's directory should be.
        std::fs::write(&blocked, "not a directory").unwrap();

        let handler = Handler::new(
            Arc::new(FakeWeather::default()),
            Arc::new(RecordingSender::default()),
            cities,
        );

        let reply = handler.respond(&message(1, "/city Омск")).await;

        assert_eq!(reply.as_deref(), Some("Город Омск сохранен"));
        assert_eq!(handler.cities().get(1).as_deref(), Some("Омск"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let handler = handler(FakeWeather::default());

        let reply = handler.respond(&message(1, "/forecast")).await;

        assert_eq!(reply.as_deref(), Some("Такая команда не доступна"));
    }

    #[tokio::test]
    async fn test_plain_text_reports_temperature() {
        let handler = handler(FakeWeather::with(&[("Москва", 21.5)]));

        let reply = handler.respond(&message(1, "Москва")).await;

        assert_eq!(reply.as_deref(), Some("Температура в Москва: 22°C"));
    }

    #[tokio::test]
    async fn test_unknown_place_skips_weather_lookup() {
        let weather = Arc::new(FakeWeather::default());
        let handler = Handler::new(
            weather.clone(),
            Arc::new(RecordingSender::default()),
            UserCities::in_memory(),
        );

        let reply = handler.respond(&message(1, "Атлантида")).await;

        assert_eq!(reply.as_deref(), Some("Не смогли получить координаты"));
        assert_eq!(*weather.weather_calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_weather_failure() {
        let weather = FakeWeather {
            broken_weather: true,
            ..FakeWeather::with(&[("Сочи", 25.0)])
        };
        let handler = handler(weather);

        let reply = handler.respond(&message(1, "Сочи")).await;

        assert_eq!(
            reply.as_deref(),
            Some("Не смогли получить погоду в этой местности")
        );
    }

    #[tokio::test]
    async fn test_saved_city_is_per_user() {
        let handler = handler(FakeWeather::with(&[("Мурманск", -12.4)]));

        handler.respond(&message(1, "/city Мурманск")).await;

        assert_eq!(
            handler.respond(&message(1, "/weather")).await.as_deref(),
            Some("Температура в Мурманск: -12°C")
        );
        assert_eq!(
            handler.respond(&message(2, "/weather")).await.as_deref(),
            Some(replies::NO_SAVED_CITY)
        );
    }

    #[tokio::test]
    async fn test_message_without_sender_uses_chat_id() {
        let handler = handler(FakeWeather::default());
        let msg: Message = serde_json::from_value(serde_json::json!({
            "message_id": 3,
            "chat": {"id": -1001},
            "text": "/city Тверь",
            "entities": [{"type": "bot_command", "offset": 0, "length": 5}]
        }))
        .unwrap();

        handler.respond(&msg).await;

        assert_eq!(handler.cities().get(-1001).as_deref(), Some("Тверь"));
    }

    #[tokio::test]
    async fn test_handle_update_replies_to_message() {
        let sender = Arc::new(RecordingSender::default());
        let handler = Handler::new(
            Arc::new(FakeWeather::default()),
            sender.clone(),
            UserCities::in_memory(),
        );

        handler
            .handle_update(Update {
                update_id: 1,
                message: Some(message(7, "/city Псков")),
            })
            .await;

        let sent = sender.sent.lock();
        assert_eq!(
            *sent,
            vec![OutgoingMessage::new(507, "Город Псков сохранен").replying_to(10)]
        );
    }

    #[tokio::test]
    async fn test_reply_quoting_can_be_disabled() {
        let sender = Arc::new(RecordingSender::default());
        let handler = Handler::new(
            Arc::new(FakeWeather::default()),
            sender.clone(),
            UserCities::in_memory(),
        )
        .reply_to_message(false);

        handler
            .handle_update(Update {
                update_id: 1,
                message: Some(message(7, "/help")),
            })
            .await;

        assert_eq!(sender.sent.lock()[0].reply_to, None);
    }

    #[tokio::test]
    async fn test_updates_without_message_or_text_are_ignored() {
        let sender = Arc::new(RecordingSender::default());
        let handler = Handler::new(
            Arc::new(FakeWeather::default()),
            sender.clone(),
            UserCities::in_memory(),
        );

        handler
            .handle_update(Update {
                update_id: 1,
                message: None,
            })
            .await;
        let sticker: Message =
            serde_json::from_value(serde_json::json!({"message_id": 2, "chat": {"id": 1}}))
                .unwrap();
        handler
            .handle_update(Update {
                update_id: 2,
                message: Some(sticker),
            })
            .await;

        assert!(sender.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_run_survives_delivery_failures() {
        let sender = Arc::new(RecordingSender {
            fail: true,
            ..RecordingSender::default()
        });
        let handler = Handler::new(
            Arc::new(FakeWeather::default()),
            sender.clone(),
            UserCities::in_memory(),
        );

        let (tx, rx) = mpsc::channel(4);
        for (id, text) in [(1, "/city Уфа"), (2, "/start")] {
            tx.send(Update {
                update_id: id,
                message: Some(message(1, text)),
            })
            .await
            .unwrap();
        }
        drop(tx);

        handler.run(rx, CancellationToken::new()).await;

        assert_eq!(sender.sent.lock().len(), 2);
        assert_eq!(handler.cities().get(1).as_deref(), Some("Уфа"));
    }
}
