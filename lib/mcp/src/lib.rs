//! MCP (Model Context Protocol) client and tool gateway.
//!
//! Talks JSON-RPC 2.0 to a tool server over its stdio and exposes its
//! tools to the conversation engine through [`McpToolGateway`].

pub mod client;
pub mod error;
pub mod gateway;
pub mod protocol;

pub use client::McpClient;
pub use error::McpError;
pub use gateway::{McpServerSettings, McpToolGateway};
pub use protocol::{CallToolResult, InitializeResult, McpTool};
