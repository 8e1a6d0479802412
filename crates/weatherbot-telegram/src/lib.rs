//! Minimal Telegram Bot API transport.
//!
//! Long-polls `getUpdates`, parses bot commands out of message entities and
//! sends plain-text replies.

pub mod client;
pub mod command;
pub mod error;
pub mod poller;
pub mod types;

pub use client::TelegramClient;
pub use error::TelegramError;
pub use poller::UpdatePoller;
pub use types::{Chat, Message, MessageEntity, OutgoingMessage, Update, User};
