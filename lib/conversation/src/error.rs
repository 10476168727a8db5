//! Error types for the conversation crate.
//!
//! Errors are designed for layered context using rootcause:
//! - `ToolError`: Errors at the tool gateway boundary
//! - `ConversationError`: High-level wrapper for context

use relaybot_core::ChatId;
use std::fmt;

/// Errors at the tool gateway boundary.
///
/// Only catalog discovery surfaces these as errors; invocation failures are
/// reported to the model as tool results instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Listing the available tools failed.
    ListFailed,
    /// Tool not found.
    NotFound { name: String },
    /// Tool execution failed.
    ExecutionFailed { name: String, reason: String },
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListFailed => write!(f, "failed to list tools"),
            Self::NotFound { name } => write!(f, "tool not found: {name}"),
            Self::ExecutionFailed { name, reason } => {
                write!(f, "tool '{name}' execution failed: {reason}")
            }
        }
    }
}

impl std::error::Error for ToolError {}

/// High-level conversation errors.
///
/// Use these to add context when wrapping lower-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationError {
    /// A model round failed (use as context wrapper).
    ModelRound { chat_id: ChatId, round: u32 },
}

impl fmt::Display for ConversationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelRound { chat_id, round } => {
                write!(f, "model round {round} failed for chat {chat_id}")
            }
        }
    }
}

impl std::error::Error for ConversationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_display() {
        let err = ToolError::ExecutionFailed {
            name: "notion_search".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(err.to_string().contains("notion_search"));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn conversation_error_display() {
        let err = ConversationError::ModelRound {
            chat_id: ChatId::new(7),
            round: 2,
        };
        assert_eq!(err.to_string(), "model round 2 failed for chat 7");
    }
}
