//! OpenWeather integration for the bot.
//!
//! Resolves a free-form place name to coordinates (geocoding API) and
//! fetches current conditions for those coordinates.

pub mod client;
pub mod types;

pub use client::OpenWeatherClient;
pub use types::*;
