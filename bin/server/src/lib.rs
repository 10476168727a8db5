//! relaybot server: a Telegram bot that relays chats to a language model
//! with MCP tools.
//!
//! Updates arrive by long polling or webhook and share one [`Dispatcher`].

pub mod bridge;
pub mod commands;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod polling;
pub mod webhook;

pub use bridge::{Bridge, run, shutdown_signal};
pub use config::{BotConfig, RunMode};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use error::{ConfigError, SetupError, StartupError};
