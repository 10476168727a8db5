//! Inbound update dispatch.
//!
//! Shared by the polling and webhook adapters. Dispatch never fails: every
//! error is logged and, where a user is waiting, answered with an apology.

use crate::commands::{self, Command};
use relaybot_conversation::{ConversationEngine, SessionStore};
use relaybot_core::ChatId;
use relaybot_telegram::{MAX_MESSAGE_CHARS, Messenger, ParseMode, TelegramError, Update, split_message};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Sent when a model round or a send fails.
pub const APOLOGY_TEXT: &str = "❌ Sorry, I encountered an error. Please try again.";

/// Sent when the model answers with no text at all.
pub const EMPTY_REPLY_TEXT: &str = "🤔 I don't have anything to add to that.";

/// What happened to an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a text message, or an unknown command.
    Ignored,
    /// A bot command was answered.
    Command(Command),
    /// The model answered.
    Replied { rounds: u32, tool_calls: usize },
    /// Processing failed; the user got an apology.
    Failed,
}

/// Routes updates to command handlers or the conversation engine.
pub struct Dispatcher {
    engine: Arc<ConversationEngine>,
    sessions: Arc<dyn SessionStore>,
    messenger: Arc<dyn Messenger>,
}

impl Dispatcher {
    /// Creates a dispatcher. `sessions` must be the store the engine uses.
    #[must_use]
    pub fn new(
        engine: Arc<ConversationEngine>,
        sessions: Arc<dyn SessionStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        Self {
            engine,
            sessions,
            messenger,
        }
    }

    /// Handles one update.
    #[instrument(skip(self, update), fields(update_id = update.update_id))]
    pub async fn handle_update(&self, update: &Update) -> DispatchOutcome {
        let Some((chat_id, text)) = update.text_message() else {
            debug!("ignoring update without text message");
            return DispatchOutcome::Ignored;
        };

        if let Some(command) = Command::parse(text) {
            self.run_command(chat_id, command).await;
            return DispatchOutcome::Command(command);
        }

        if text.starts_with('/') {
            debug!(chat_id = %chat_id, "ignoring unknown command");
            return DispatchOutcome::Ignored;
        }

        self.converse(chat_id, text).await
    }

    async fn run_command(&self, chat_id: ChatId, command: Command) {
        info!(chat_id = %chat_id, command = ?command, "handling command");

        let text = match command {
            Command::Start => commands::welcome_text(!self.engine.catalog().is_empty()),
            Command::Clear => {
                let existed = self.sessions.clear(chat_id).await;
                debug!(chat_id = %chat_id, existed, "session cleared");
                commands::CLEARED_TEXT.to_string()
            }
            Command::Help => commands::help_text(self.engine.catalog()),
        };

        if let Err(e) = self.messenger.send_text(chat_id, &text, None).await {
            error!(chat_id = %chat_id, error = %e, "failed to answer command");
            self.apologize(chat_id).await;
        }
    }

    async fn converse(&self, chat_id: ChatId, text: &str) -> DispatchOutcome {
        let messenger = Arc::clone(&self.messenger);
        tokio::spawn(async move {
            if let Err(e) = messenger.send_typing(chat_id).await {
                debug!(chat_id = %chat_id, error = %e, "typing indicator failed");
            }
        });

        let reply = match self.engine.respond(chat_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(chat_id = %chat_id, error = %e, "conversation failed");
                self.apologize(chat_id).await;
                return DispatchOutcome::Failed;
            }
        };

        let body = if reply.text.trim().is_empty() {
            EMPTY_REPLY_TEXT
        } else {
            reply.text.as_str()
        };

        if let Err(e) = self.send_chunked(chat_id, body).await {
            error!(chat_id = %chat_id, error = %e, "failed to deliver reply");
            self.apologize(chat_id).await;
            return DispatchOutcome::Failed;
        }

        info!(
            chat_id = %chat_id,
            rounds = reply.rounds,
            tool_calls = reply.tool_calls,
            "reply delivered"
        );
        DispatchOutcome::Replied {
            rounds: reply.rounds,
            tool_calls: reply.tool_calls,
        }
    }

    async fn send_chunked(&self, chat_id: ChatId, text: &str) -> relaybot_core::Result<(), TelegramError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.messenger
                .send_text(chat_id, &chunk, Some(ParseMode::Markdown))
                .await?;
        }
        Ok(())
    }

    async fn apologize(&self, chat_id: ChatId) {
        if let Err(e) = self.messenger.send_text(chat_id, APOLOGY_TEXT, None).await {
            error!(chat_id = %chat_id, error = %e, "failed to send apology");
        }
    }
}
