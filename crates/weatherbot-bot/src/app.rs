use tokio_util::sync::CancellationToken;
use weatherbot_core::Config;
use weatherbot_telegram::{TelegramClient, UpdatePoller};
use weatherbot_weather::OpenWeatherClient;

use crate::city_store::UserCities;
use crate::error::AppError;
use crate::handler::Handler;

/// Fully wired bot: poller feeding the handler
pub struct App {
    telegram: TelegramClient,
    poller: UpdatePoller,
    handler: Handler<OpenWeatherClient, TelegramClient>,
}

impl App {
    /// Build clients and the city store from configuration.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let weather = OpenWeatherClient::new(&config.openweather)?;
        let telegram = TelegramClient::new(&config.telegram)?;

        let cities = if config.storage.persist_cities {
            UserCities::persistent(config.cities_path())?
        } else {
            UserCities::in_memory()
        };

        let handler = Handler::new(weather, telegram.clone(), cities)
            .reply_to_message(config.telegram.reply_to_message);
        let poller = UpdatePoller::new(telegram.clone(), config.telegram.poll_timeout_secs);

        Ok(Self {
            telegram,
            poller,
            handler,
        })
    }

    /// Run until `cancel` fires or polling fails for good.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), AppError> {
        let me = self.telegram.get_me().await?;
        tracing::info!(
            "Authorized as @{}",
            me.username.as_deref().unwrap_or(&me.first_name)
        );

        let (updates, poller) = self.poller.spawn(cancel.clone());
        self.handler.run(updates, cancel.clone()).await;

        // The handler also stops when the poller gives up; make sure both are done.
        cancel.cancel();
        poller.await??;
        Ok(())
    }
}
