//! Telegram Bot API client for relaybot.
//!
//! Covers the handful of Bot API methods the bridge uses: `getMe`,
//! `getUpdates`, `sendMessage`, `sendChatAction` and `setWebhook`.

pub mod chunk;
pub mod client;
pub mod error;
pub mod messenger;
pub mod types;

pub use chunk::{MAX_MESSAGE_CHARS, split_message};
pub use client::{DEFAULT_API_BASE, TelegramClient};
pub use error::TelegramError;
pub use messenger::Messenger;
pub use types::{ChatAction, Message, ParseMode, Update, User};
