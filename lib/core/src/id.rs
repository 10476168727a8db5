//! Strongly-typed identifiers.
//!
//! Local bookkeeping IDs use ULID (Universally Unique Lexicographically
//! Sortable Identifier) format. Chat identifiers are assigned by the
//! messaging platform and are carried through unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Macro to generate a strongly-typed ID wrapper around ULID.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a new ID with a randomly generated ULID.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let prefix_with_underscore = concat!($prefix, "_");
                let ulid_str = s.strip_prefix(prefix_with_underscore).unwrap_or(s);

                Ulid::from_str(ulid_str)
                    .map(Self)
                    .map_err(|e| ParseIdError {
                        id_type: stringify!($name),
                        reason: e.to_string(),
                    })
            }
        }
    };
}

define_id!(
    /// Unique identifier for a single turn in a conversation session.
    TurnId,
    "turn"
);

/// Identifier of a chat on the messaging platform.
///
/// Telegram assigns signed 64-bit identifiers; group chats are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(i64);

impl ChatId {
    /// Wraps a raw platform chat identifier.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw platform identifier.
    #[must_use]
    pub const fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for ChatId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChatId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self).map_err(|e| ParseIdError {
            id_type: "ChatId",
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_id_display_format() {
        let id = TurnId::new();
        assert!(id.to_string().starts_with("turn_"));
    }

    #[test]
    fn turn_id_parse_with_and_without_prefix() {
        let id = TurnId::new();
        let parsed: TurnId = id.to_string().parse().expect("should parse");
        assert_eq!(id, parsed);

        let raw: TurnId = id.as_ulid().to_string().parse().expect("should parse");
        assert_eq!(id, raw);
    }

    #[test]
    fn turn_id_parse_invalid() {
        let err = "turn_nope".parse::<TurnId>().unwrap_err();
        assert_eq!(err.id_type, "TurnId");
    }

    #[test]
    fn chat_id_keeps_negative_group_ids() {
        let id: ChatId = "-1001234567890".parse().expect("should parse");
        assert_eq!(id.get(), -1_001_234_567_890);
        assert_eq!(id.to_string(), "-1001234567890");
    }

    #[test]
    fn chat_id_rejects_non_numeric() {
        let err = "@channel".parse::<ChatId>().unwrap_err();
        assert_eq!(err.id_type, "ChatId");
    }

    #[test]
    fn chat_id_serializes_as_bare_integer() {
        let json = serde_json::to_string(&ChatId::new(42)).expect("serialize");
        assert_eq!(json, "42");
        let parsed: ChatId = serde_json::from_str("42").expect("deserialize");
        assert_eq!(parsed, ChatId::new(42));
    }
}
