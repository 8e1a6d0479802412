//! Conversation logic: turns Telegram messages into weather replies.

pub mod app;
pub mod city_store;
pub mod error;
pub mod handler;
pub mod ports;
pub mod replies;
pub mod request;

pub use app::App;
pub use city_store::UserCities;
pub use error::AppError;
pub use handler::Handler;
pub use ports::{ReplySender, WeatherLookup};
pub use request::Request;
