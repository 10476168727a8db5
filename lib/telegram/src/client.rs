//! Telegram Bot API client.

use crate::error::TelegramError;
use crate::types::{ApiResponse, ChatAction, Message, ParseMode, Update, User};
use relaybot_core::{ChatId, Result};
use serde::de::DeserializeOwned;
use serde_json::{Value as JsonValue, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Default Bot API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Headroom added to the long-poll timeout for the HTTP exchange itself.
const POLL_HEADROOM: Duration = Duration::from_secs(15);

/// Client for the Telegram Bot API.
///
/// The bot token is part of every request URL, so transport errors are
/// stripped of their URL before they are reported.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is empty or the HTTP client cannot be
    /// built.
    pub fn new(
        token: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TelegramError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(TelegramError::InvalidConfig {
                reason: "bot token is empty".to_string(),
            }
            .into());
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelegramError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_base: api_base.into(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }

    /// Posts `payload` to `method` and returns the JSON body.
    async fn post_raw(
        &self,
        method: &str,
        payload: &JsonValue,
        timeout: Option<Duration>,
    ) -> std::result::Result<JsonValue, TelegramError> {
        let mut request = self.http.post(self.method_url(method)).json(payload);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TelegramError::Transport {
                method: method.to_string(),
                reason: e.without_url().to_string(),
            })?;

        // Error envelopes come with 4xx statuses, so the body is read either way.
        let body: JsonValue = response
            .json()
            .await
            .map_err(|e| TelegramError::InvalidResponse {
                method: method.to_string(),
                reason: e.without_url().to_string(),
            })?;

        Ok(body)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: &JsonValue,
        timeout: Option<Duration>,
    ) -> std::result::Result<T, TelegramError> {
        let body = self.post_raw(method, payload, timeout).await?;
        decode(method, body)
    }

    /// Returns the bot's own user.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is rejected or the API is unreachable.
    #[instrument(skip(self))]
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        Ok(self.call("getMe", &json!({}), None).await?)
    }

    /// Long-polls for updates after `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or Telegram rejects it.
    #[instrument(skip(self))]
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let payload = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                &payload,
                Some(Duration::from_secs(timeout_secs) + POLL_HEADROOM),
            )
            .await?;

        if !updates.is_empty() {
            debug!(count = updates.len(), "received updates");
        }
        Ok(updates)
    }

    /// Sends a text message.
    ///
    /// # Errors
    ///
    /// Returns an error if Telegram rejects the message.
    #[instrument(skip(self, text), fields(chat_id = %chat_id, len = text.len()))]
    pub async fn send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message, TelegramError> {
        Ok(self.try_send_message(chat_id, text, parse_mode).await?)
    }

    pub(crate) async fn try_send_message(
        &self,
        chat_id: ChatId,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> std::result::Result<Message, TelegramError> {
        let mut payload = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(mode) = parse_mode {
            payload["parse_mode"] = json!(mode);
        }

        self.call("sendMessage", &payload, None).await
    }

    /// Shows a chat action such as "typing".
    ///
    /// # Errors
    ///
    /// Returns an error if Telegram rejects the action.
    #[instrument(skip(self), fields(chat_id = %chat_id))]
    pub async fn send_chat_action(
        &self,
        chat_id: ChatId,
        action: ChatAction,
    ) -> Result<bool, TelegramError> {
        Ok(self
            .call(
                "sendChatAction",
                &json!({ "chat_id": chat_id, "action": action }),
                None,
            )
            .await?)
    }

    /// Registers `url` as the bot's webhook.
    ///
    /// Returns Telegram's raw response envelope, including `ok: false`
    /// answers, so the caller can relay it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the exchange itself fails.
    #[instrument(skip(self))]
    pub async fn set_webhook(&self, url: &str) -> Result<JsonValue, TelegramError> {
        let body = self.post_raw("setWebhook", &json!({ "url": url }), None).await?;
        if body.get("ok").and_then(JsonValue::as_bool) != Some(true) {
            warn!(response = %body, "Telegram rejected setWebhook");
        }
        Ok(body)
    }
}

/// Unwraps a Bot API envelope.
fn decode<T: DeserializeOwned>(method: &str, body: JsonValue) -> std::result::Result<T, TelegramError> {
    let envelope: ApiResponse<T> =
        serde_json::from_value(body).map_err(|e| TelegramError::InvalidResponse {
            method: method.to_string(),
            reason: e.to_string(),
        })?;

    if !envelope.ok {
        return Err(TelegramError::Api {
            method: method.to_string(),
            code: envelope.error_code,
            description: envelope
                .description
                .unwrap_or_else(|| "no description".to_string()),
        });
    }

    envelope.result.ok_or_else(|| TelegramError::InvalidResponse {
        method: method.to_string(),
        reason: "missing result".to_string(),
    })
}
