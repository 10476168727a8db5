//! Error types for the MCP client.

use std::fmt;

/// Errors talking to an MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum McpError {
    /// The server process could not be started.
    Spawn { command: String, reason: String },
    /// The server closed its output or exited.
    ConnectionClosed,
    /// Writing to the server failed.
    Io { reason: String },
    /// No response arrived in time.
    Timeout { method: String },
    /// The server answered with a JSON-RPC error.
    Rpc { code: i64, message: String },
    /// The response could not be interpreted.
    InvalidResponse { method: String, reason: String },
}

impl fmt::Display for McpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { command, reason } => {
                write!(f, "failed to start MCP server '{command}': {reason}")
            }
            Self::ConnectionClosed => write!(f, "MCP server connection closed"),
            Self::Io { reason } => write!(f, "MCP transport error: {reason}"),
            Self::Timeout { method } => write!(f, "MCP request '{method}' timed out"),
            Self::Rpc { code, message } => write!(f, "MCP error {code}: {message}"),
            Self::InvalidResponse { method, reason } => {
                write!(f, "invalid MCP response to '{method}': {reason}")
            }
        }
    }
}

impl std::error::Error for McpError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_display() {
        let err = McpError::Rpc {
            code: -32601,
            message: "Method not found".to_string(),
        };
        assert_eq!(err.to_string(), "MCP error -32601: Method not found");
    }

    #[test]
    fn spawn_error_names_command() {
        let err = McpError::Spawn {
            command: "npx".to_string(),
            reason: "No such file or directory".to_string(),
        };
        assert!(err.to_string().contains("'npx'"));
    }
}
