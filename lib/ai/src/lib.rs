//! Language-model primitives for relaybot.
//!
//! This crate provides:
//!
//! - **Backend**: the request/response contract of a tool-capable chat model
//!   and the [`ModelBackend`] trait the conversation engine talks to
//! - **Anthropic**: a [`ModelBackend`] over the Anthropic Messages API

pub mod anthropic;
pub mod backend;
pub mod error;

pub use anthropic::AnthropicClient;
pub use backend::{
    ContentBlock, MessageContent, ModelBackend, ModelMessage, ModelRequest, ModelResponse, Role,
    TokenUsage, ToolChoice, ToolSpec,
};
pub use error::LlmError;
