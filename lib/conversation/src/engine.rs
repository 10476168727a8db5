//! Conversation engine.
//!
//! Drives one user message through rounds of model consultation and tool
//! invocation:
//!
//! 1. Append the user turn and query the model (AwaitingModel)
//! 2. If the response requests tools, record it, invoke each tool in the
//!    order requested, record the results as one user-role turn, and query
//!    again
//! 3. Otherwise record the response and finish (Done)
//!
//! The reply is the text of every round, joined by newlines.

use crate::error::ConversationError;
use crate::message::Turn;
use crate::session::SessionStore;
use crate::tool::{ToolCatalog, ToolGateway, ToolInvocation, ToolOutcome};
use relaybot_ai::{ContentBlock, ModelBackend, ModelRequest, ToolChoice};
use relaybot_core::{ChatId, Result};
use rootcause::prelude::ResultExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Configuration for the conversation engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier.
    pub model: String,
    /// Maximum tokens per model response.
    pub max_tokens: u32,
    /// System prompt sent with every request.
    pub system_prompt: Option<String>,
    /// Number of recent turns sent to the model; `None` sends everything.
    pub history_window: Option<usize>,
    /// Rounds in which the model may call tools. After this many, one
    /// final round forbids tool use.
    pub max_tool_rounds: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            system_prompt: None,
            history_window: Some(10),
            max_tool_rounds: 8,
        }
    }
}

impl EngineConfig {
    /// Sets the model identifier.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the maximum tokens per response.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the history window.
    #[must_use]
    pub fn with_history_window(mut self, window: Option<usize>) -> Self {
        self.history_window = window;
        self
    }

    /// Sets the tool round cap.
    #[must_use]
    pub fn with_max_tool_rounds(mut self, max: u32) -> Self {
        self.max_tool_rounds = max;
        self
    }
}

/// The engine's answer to one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Text to send to the user.
    pub text: String,
    /// Number of model rounds taken.
    pub rounds: u32,
    /// Number of tool invocations made.
    pub tool_calls: usize,
}

/// Where the round loop stands after a model response.
enum RoundState {
    AwaitingModel,
    Done,
}

/// Drives the model / tool round loop and records turns.
pub struct ConversationEngine {
    config: EngineConfig,
    model: Arc<dyn ModelBackend>,
    tools: Arc<dyn ToolGateway>,
    sessions: Arc<dyn SessionStore>,
    catalog: ToolCatalog,
}

impl ConversationEngine {
    /// Creates an engine.
    ///
    /// `catalog` is the tool list discovered at startup; an empty catalog
    /// disables tool use.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        model: Arc<dyn ModelBackend>,
        tools: Arc<dyn ToolGateway>,
        sessions: Arc<dyn SessionStore>,
        catalog: ToolCatalog,
    ) -> Self {
        Self {
            config,
            model,
            tools,
            sessions,
            catalog,
        }
    }

    /// Returns the tool catalog.
    #[must_use]
    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Processes one user message and returns the reply.
    ///
    /// # Errors
    ///
    /// Returns an error if a model round fails. Turns recorded before the
    /// failure stay in the session. Tool failures are not errors.
    #[instrument(skip(self, text), fields(chat_id = %chat_id))]
    pub async fn respond(&self, chat_id: ChatId, text: &str) -> Result<Reply, ConversationError> {
        self.sessions.append(chat_id, Turn::user(text)).await;

        let mut round_texts: Vec<String> = Vec::new();
        let mut rounds = 0u32;
        let mut tool_calls = 0usize;
        let mut state = RoundState::AwaitingModel;

        while let RoundState::AwaitingModel = state {
            rounds += 1;
            let tools_allowed = rounds <= self.config.max_tool_rounds;
            let request = self.build_request(chat_id, tools_allowed).await;

            let response = self
                .model
                .complete(&request)
                .await
                .context(ConversationError::ModelRound {
                    chat_id,
                    round: rounds,
                })?;

            let text = response.text();
            if !text.is_empty() {
                round_texts.push(text);
            }

            let invocations: Vec<ToolInvocation> = response
                .content
                .iter()
                .filter_map(ToolInvocation::from_block)
                .collect();

            if invocations.is_empty() {
                self.record_assistant(chat_id, response.content).await;
                state = RoundState::Done;
            } else if !tools_allowed {
                warn!(
                    round = rounds,
                    requested = invocations.len(),
                    "model requested tools after the round cap; keeping text only"
                );
                let text_only = response
                    .content
                    .into_iter()
                    .filter(|b| matches!(b, ContentBlock::Text { .. }))
                    .collect();
                self.record_assistant(chat_id, text_only).await;
                state = RoundState::Done;
            } else {
                self.record_assistant(chat_id, response.content).await;
                let results = self.run_tools(&invocations).await;
                tool_calls += invocations.len();
                self.sessions
                    .append(chat_id, Turn::tool_results(results))
                    .await;
            }
        }

        info!(rounds, tool_calls, "conversation round loop finished");

        Ok(Reply {
            text: round_texts.join("\n"),
            rounds,
            tool_calls,
        })
    }

    async fn build_request(&self, chat_id: ChatId, tools_allowed: bool) -> ModelRequest {
        let session = self.sessions.get_or_create(chat_id).await;
        let messages = session
            .recent_turns(self.config.history_window)
            .iter()
            .map(Turn::to_model_message)
            .collect();

        let mut request =
            ModelRequest::new(self.config.model.clone(), self.config.max_tokens).with_messages(messages);

        if let Some(system) = &self.config.system_prompt {
            request = request.with_system(system.clone());
        }

        // History may hold tool blocks, so the catalog stays attached even
        // when tool use is forbidden for this round.
        if !self.catalog.is_empty() {
            request = request.with_tools(self.catalog.to_specs());
            if !tools_allowed {
                request = request.with_tool_choice(ToolChoice::None);
            }
        }

        request
    }

    /// Appends the assistant turn, skipping content the model API would
    /// reject on the next request.
    async fn record_assistant(&self, chat_id: ChatId, content: Vec<ContentBlock>) {
        let blocks: Vec<ContentBlock> = content
            .into_iter()
            .filter(|b| !matches!(b, ContentBlock::Unsupported))
            .collect();

        if blocks.is_empty() {
            debug!("model returned no recordable content");
            return;
        }

        self.sessions.append(chat_id, Turn::assistant(blocks)).await;
    }

    /// Invokes each tool in request order and returns the result blocks in
    /// the same order, matched to their requests by correlation id.
    async fn run_tools(&self, invocations: &[ToolInvocation]) -> Vec<ContentBlock> {
        let mut outcomes: HashMap<&str, ToolOutcome> = HashMap::with_capacity(invocations.len());

        for invocation in invocations {
            debug!(tool = %invocation.name, id = %invocation.id, "invoking tool");
            let outcome = self
                .tools
                .invoke(&invocation.name, invocation.arguments.clone())
                .await;

            if let Some(error) = &outcome.error {
                warn!(tool = %invocation.name, id = %invocation.id, error = %error, "tool invocation failed");
            }

            outcomes.insert(invocation.id.as_str(), outcome);
        }

        invocations
            .iter()
            .map(|invocation| {
                outcomes
                    .remove(invocation.id.as_str())
                    .unwrap_or_else(|| ToolOutcome::failure("no result recorded for this call"))
                    .into_result_block(invocation.id.clone())
            })
            .collect()
    }
}
