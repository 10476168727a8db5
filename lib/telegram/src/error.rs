//! Error types for the Telegram crate.

use std::fmt;

/// Errors from Bot API calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramError {
    /// The HTTP exchange failed.
    Transport { method: String, reason: String },
    /// The Bot API answered `ok: false`.
    Api {
        method: String,
        code: Option<i64>,
        description: String,
    },
    /// The response body could not be interpreted.
    InvalidResponse { method: String, reason: String },
    /// Invalid client configuration.
    InvalidConfig { reason: String },
}

impl TelegramError {
    /// Returns true if Telegram rejected the message formatting.
    #[must_use]
    pub fn is_parse_entities_error(&self) -> bool {
        matches!(self, Self::Api { description, .. } if description.contains("can't parse entities"))
    }
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { method, reason } => {
                write!(f, "Telegram {method} request failed: {reason}")
            }
            Self::Api {
                method,
                code,
                description,
            } => match code {
                Some(code) => write!(f, "Telegram {method} returned {code}: {description}"),
                None => write!(f, "Telegram {method} returned error: {description}"),
            },
            Self::InvalidResponse { method, reason } => {
                write!(f, "invalid Telegram {method} response: {reason}")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid Telegram configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for TelegramError {}
