//! Conversation service for relaybot.
//!
//! This crate provides:
//!
//! - **Session Store**: per-chat conversation history
//! - **Tool Gateway**: the boundary to externally invocable tools
//! - **Conversation Engine**: the model / tool round loop for one user message

pub mod engine;
pub mod error;
pub mod message;
pub mod session;
pub mod tool;

pub use engine::{ConversationEngine, EngineConfig, Reply};
pub use error::{ConversationError, ToolError};
pub use message::{Turn, TurnContent};
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use tool::{
    NoTools, ToolCatalog, ToolDescriptor, ToolGateway, ToolInvocation, ToolOutcome,
};
