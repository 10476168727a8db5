//! Centralized bot configuration.
//!
//! Loaded via the `config` crate from environment variables. Nested keys
//! use `__` as separator, so `MODEL__MAX_TOKENS` sets `model.max_tokens`.

use crate::error::ConfigError;
use relaybot_conversation::EngineConfig;
use relaybot_mcp::McpServerSettings;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Built-in system prompt when tools are available.
pub const TOOLS_SYSTEM_PROMPT: &str = "You are a helpful personal assistant connected to the user's Notion workspace through tools. \
You can search and query databases, read pages, create and update pages, and append content. \
When the user asks about their Notion data, use the tools instead of guessing. Keep answers concise.";

/// Built-in system prompt when tools are disabled.
pub const PLAIN_SYSTEM_PROMPT: &str = "You are a helpful personal assistant. You cannot reach the user's Notion workspace directly, \
but you can help draft content for it, plan and organize tasks, brainstorm, and answer questions. \
When asked to act on Notion, say so and offer to prepare the content instead.";

/// A secret string that never shows up in debug output.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Returns the secret value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[redacted]")
    }
}

/// How updates reach the bot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Long-poll `getUpdates`.
    #[default]
    Polling,
    /// Serve an HTTP endpoint Telegram posts to.
    Webhook,
}

/// Bot configuration composed from per-concern sections.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Telegram bot token (`TELEGRAM_BOT_TOKEN`).
    #[serde(default)]
    pub telegram_bot_token: Secret,

    /// Anthropic API key (`ANTHROPIC_API_KEY`).
    #[serde(default)]
    pub anthropic_api_key: Secret,

    /// Notion integration token handed to the tool server (`NOTION_TOKEN`).
    #[serde(default)]
    pub notion_token: Option<Secret>,

    /// Delivery mode.
    #[serde(default)]
    pub mode: RunMode,

    /// Timeout for every outbound HTTP exchange, in seconds.
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    #[serde(default)]
    pub telegram: TelegramSettings,

    #[serde(default)]
    pub model: ModelSettings,

    #[serde(default)]
    pub conversation: ConversationSettings,

    #[serde(default)]
    pub tools: ToolSettings,

    #[serde(default)]
    pub webhook: WebhookSettings,
}

/// Telegram client settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSettings {
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,

    /// Server-side long-poll timeout.
    #[serde(default = "default_poll_timeout_seconds")]
    pub poll_timeout_seconds: u64,

    /// Pause after a failed poll.
    #[serde(default = "default_poll_error_pause_seconds")]
    pub poll_error_pause_seconds: u64,
}

/// Language-model settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_model_api_base")]
    pub api_base: String,

    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Conversation engine settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSettings {
    /// Turns sent to the model per request; 0 sends the whole history.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Model rounds per message that may call tools.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

/// MCP tool server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "default_tools_enabled")]
    pub enabled: bool,

    #[serde(default = "default_tools_command")]
    pub command: String,

    /// Arguments, space separated in the environment.
    #[serde(default = "default_tools_args")]
    pub args: Vec<String>,

    /// Timeout for one MCP request, in seconds.
    #[serde(default = "default_tool_call_timeout_seconds")]
    pub call_timeout_seconds: u64,
}

/// Webhook server settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSettings {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Public base URL Telegram should call; the request host is used when
    /// unset.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_http_timeout_seconds() -> u64 {
    120
}

fn default_telegram_api_base() -> String {
    relaybot_telegram::DEFAULT_API_BASE.to_string()
}

fn default_poll_timeout_seconds() -> u64 {
    30
}

fn default_poll_error_pause_seconds() -> u64 {
    5
}

fn default_model_name() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_model_api_base() -> String {
    relaybot_ai::anthropic::DEFAULT_API_BASE.to_string()
}

fn default_history_window() -> usize {
    10
}

fn default_max_rounds() -> u32 {
    8
}

fn default_tools_enabled() -> bool {
    true
}

fn default_tools_command() -> String {
    "npx".to_string()
}

fn default_tools_args() -> Vec<String> {
    vec![
        "-y".to_string(),
        "@modelcontextprotocol/server-notion".to_string(),
    ]
}

fn default_tool_call_timeout_seconds() -> u64 {
    120
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            api_base: default_telegram_api_base(),
            poll_timeout_seconds: default_poll_timeout_seconds(),
            poll_error_pause_seconds: default_poll_error_pause_seconds(),
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            max_tokens: default_max_tokens(),
            api_base: default_model_api_base(),
            system_prompt: None,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_rounds: default_max_rounds(),
        }
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            enabled: default_tools_enabled(),
            command: default_tools_command(),
            args: default_tools_args(),
            call_timeout_seconds: default_tool_call_timeout_seconds(),
        }
    }
}

impl Default for WebhookSettings {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            public_url: None,
        }
    }
}

impl BotConfig {
    /// Loads and validates configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or a required value is
    /// missing.
    pub fn load() -> relaybot_core::Result<Self, ConfigError> {
        let config = Self::from_environment(config::Environment::default())?;
        config.validate()?;
        Ok(config)
    }

    fn from_environment(environment: config::Environment) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(
                environment
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(" ")
                    .with_list_parse_key("tools.args"),
            )
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigError::Load {
                reason: e.to_string(),
            })
    }

    /// Checks that required values are present and sane.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_bot_token.is_blank() {
            return Err(ConfigError::Missing {
                key: "TELEGRAM_BOT_TOKEN",
            });
        }
        if self.anthropic_api_key.is_blank() {
            return Err(ConfigError::Missing {
                key: "ANTHROPIC_API_KEY",
            });
        }
        if self.tools.enabled && self.notion_token.as_ref().is_none_or(Secret::is_blank) {
            return Err(ConfigError::Missing { key: "NOTION_TOKEN" });
        }
        if self.model.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                key: "MODEL__MAX_TOKENS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.tools.enabled && self.tools.command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "TOOLS__COMMAND",
                reason: "must not be empty when tools are enabled".to_string(),
            });
        }
        Ok(())
    }

    /// Timeout for outbound HTTP exchanges.
    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// The system prompt: the configured one, else the built-in prompt for
    /// the tool mode.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        match &self.model.system_prompt {
            Some(prompt) => prompt,
            None if self.tools.enabled => TOOLS_SYSTEM_PROMPT,
            None => PLAIN_SYSTEM_PROMPT,
        }
    }

    /// Engine settings derived from this configuration.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        let window = match self.conversation.history_window {
            0 => None,
            n => Some(n),
        };

        EngineConfig::default()
            .with_model(self.model.name.clone())
            .with_max_tokens(self.model.max_tokens)
            .with_system_prompt(self.system_prompt())
            .with_history_window(window)
            .with_max_tool_rounds(self.conversation.max_rounds)
    }

    /// How to start the MCP tool server.
    #[must_use]
    pub fn mcp_settings(&self) -> McpServerSettings {
        let mut env = HashMap::new();
        if let Some(token) = &self.notion_token {
            env.insert("NOTION_API_KEY".to_string(), token.expose().to_string());
        }

        McpServerSettings {
            command: self.tools.command.clone(),
            args: self.tools.args.clone(),
            env,
            request_timeout: Duration::from_secs(self.tools.call_timeout_seconds),
        }
    }
}
