//! Turn types for conversations.

use chrono::{DateTime, Utc};
use relaybot_ai::{ContentBlock, MessageContent, ModelMessage, Role};
use relaybot_core::TurnId;
use serde::{Deserialize, Serialize};

/// Content of a turn: plain text or ordered content blocks.
pub type TurnContent = MessageContent;

/// One role-tagged unit of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn identifier. Never sent to the model.
    pub id: TurnId,
    /// Who produced the turn.
    pub role: Role,
    /// Turn content.
    pub content: TurnContent,
    /// When the turn was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Creates a new turn.
    #[must_use]
    pub fn new(role: Role, content: TurnContent) -> Self {
        Self {
            id: TurnId::new(),
            role,
            content,
            timestamp: Utc::now(),
        }
    }

    /// Creates a plain-text user turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, MessageContent::Text(text.into()))
    }

    /// Creates an assistant turn from raw model content.
    #[must_use]
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, MessageContent::Blocks(blocks))
    }

    /// Creates the user-role turn carrying one round's tool results.
    ///
    /// The model API expects tool results under the user role.
    #[must_use]
    pub fn tool_results(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Role::User, MessageContent::Blocks(blocks))
    }

    /// Returns the content blocks, or an empty slice for plain text.
    #[must_use]
    pub fn blocks(&self) -> &[ContentBlock] {
        match &self.content {
            MessageContent::Blocks(blocks) => blocks.as_slice(),
            MessageContent::Text(_) => &[],
        }
    }

    /// Returns true if this turn reports tool results.
    #[must_use]
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::User && self.blocks().iter().any(ContentBlock::is_tool_result)
    }

    /// Returns true if this is a user turn written by a person.
    #[must_use]
    pub fn is_user_message(&self) -> bool {
        self.role == Role::User && !self.is_tool_result()
    }

    /// Converts to the model wire format.
    #[must_use]
    pub fn to_model_message(&self) -> ModelMessage {
        ModelMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}
