//! Outbound messaging seam.

use crate::client::TelegramClient;
use crate::error::TelegramError;
use crate::types::{ChatAction, ParseMode};
use async_trait::async_trait;
use relaybot_core::{ChatId, Result};
use std::future::Future;
use tracing::warn;

/// Sends text and chat actions to a chat.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends one message. `parse_mode: None` sends plain text.
    ///
    /// Text that Telegram cannot parse in the requested mode is sent again
    /// as plain text.
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TelegramError>;

    /// Shows the "typing" indicator.
    async fn send_typing(&self, chat_id: ChatId) -> Result<(), TelegramError>;
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TelegramError> {
        send_with_plain_fallback(chat_id, parse_mode, |mode| {
            self.try_send_message(chat_id, text, mode)
        })
        .await?;
        Ok(())
    }

    async fn send_typing(&self, chat_id: ChatId) -> Result<(), TelegramError> {
        self.send_chat_action(chat_id, ChatAction::Typing).await?;
        Ok(())
    }
}

/// Runs `send` in `parse_mode`, then once more without formatting if
/// Telegram rejected the entities.
async fn send_with_plain_fallback<F, Fut, T>(
    chat_id: ChatId,
    parse_mode: Option<ParseMode>,
    send: F,
) -> std::result::Result<T, TelegramError>
where
    F: Fn(Option<ParseMode>) -> Fut,
    Fut: Future<Output = std::result::Result<T, TelegramError>>,
{
    match send(parse_mode).await {
        Err(e) if parse_mode.is_some() && e.is_parse_entities_error() => {
            warn!(chat_id = %chat_id, error = %e, "formatting rejected, resending as plain text");
            send(None).await
        }
        outcome => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn entities_error() -> TelegramError {
        TelegramError::Api {
            method: "sendMessage".to_string(),
            code: Some(400),
            description: "Bad Request: can't parse entities: Can't find end of the entity".to_string(),
        }
    }

    /// Records the modes it is called with and fails formatted sends with
    /// `formatted_error`.
    async fn send_recorded(
        calls: &Mutex<Vec<Option<ParseMode>>>,
        mode: Option<ParseMode>,
        formatted_error: Option<TelegramError>,
    ) -> std::result::Result<(), TelegramError> {
        calls.lock().unwrap().push(mode);
        match (mode, formatted_error) {
            (Some(_), Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    #[tokio::test]
    async fn rejected_markdown_is_resent_as_plain_text() {
        let calls = Mutex::new(Vec::new());

        let result = send_with_plain_fallback(ChatId::new(1), Some(ParseMode::Markdown), |mode| {
            send_recorded(&calls, mode, Some(entities_error()))
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(*calls.lock().unwrap(), vec![Some(ParseMode::Markdown), None]);
    }

    #[tokio::test]
    async fn accepted_markdown_is_sent_once() {
        let calls = Mutex::new(Vec::new());

        send_with_plain_fallback(ChatId::new(1), Some(ParseMode::Markdown), |mode| {
            send_recorded(&calls, mode, None)
        })
        .await
        .expect("send");

        assert_eq!(*calls.lock().unwrap(), vec![Some(ParseMode::Markdown)]);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let calls = Mutex::new(Vec::new());
        let blocked = TelegramError::Api {
            method: "sendMessage".to_string(),
            code: Some(403),
            description: "Forbidden: bot was blocked by the user".to_string(),
        };

        let err = send_with_plain_fallback(ChatId::new(1), Some(ParseMode::Markdown), |mode| {
            send_recorded(&calls, mode, Some(blocked.clone()))
        })
        .await
        .unwrap_err();

        assert_eq!(err, blocked);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn plain_text_failure_is_not_retried() {
        let calls = Mutex::new(Vec::new());
        let recorded = &calls;

        let result = send_with_plain_fallback(ChatId::new(1), None, |mode| async move {
            recorded.lock().unwrap().push(mode);
            Err::<(), _>(entities_error())
        })
        .await;

        assert_eq!(result, Err(entities_error()));
        assert_eq!(*calls.lock().unwrap(), vec![None]);
    }
}
