//! [`ToolGateway`] backed by an MCP server.

use crate::client::McpClient;
use crate::error::McpError;
use crate::protocol::McpTool;
use async_trait::async_trait;
use relaybot_conversation::{ToolDescriptor, ToolError, ToolGateway, ToolOutcome};
use relaybot_core::Result;
use rootcause::prelude::ResultExt;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// How to start the MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct McpServerSettings {
    /// Executable to run.
    pub command: String,
    /// Arguments passed to it.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

/// Tool gateway that forwards invocations to an MCP server.
pub struct McpToolGateway {
    client: McpClient,
}

impl McpToolGateway {
    /// Wraps an already-initialized client.
    #[must_use]
    pub fn new(client: McpClient) -> Self {
        Self { client }
    }

    /// Starts the server and performs the handshake.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be started or rejects the
    /// handshake.
    #[instrument(skip(settings), fields(command = %settings.command))]
    pub async fn connect(settings: &McpServerSettings) -> Result<Self, McpError> {
        let client = McpClient::spawn(
            &settings.command,
            &settings.args,
            &settings.env,
            settings.request_timeout,
        )?;
        client.initialize().await?;
        Ok(Self::new(client))
    }
}

impl From<McpTool> for ToolDescriptor {
    fn from(tool: McpTool) -> Self {
        ToolDescriptor::new(tool.name, tool.description.unwrap_or_default())
            .with_input_schema(tool.input_schema)
    }
}

#[async_trait]
impl ToolGateway for McpToolGateway {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let tools = self
            .client
            .list_tools()
            .await
            .context(ToolError::ListFailed)?;

        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    #[instrument(skip(self, arguments))]
    async fn invoke(&self, name: &str, arguments: JsonValue) -> ToolOutcome {
        match self.client.call_tool(name, arguments).await {
            Ok(result) if result.is_error => {
                let text = result.text();
                let reason = if text.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    text
                };
                ToolOutcome::failure(reason)
            }
            Ok(result) => {
                debug!(items = result.content.len(), "tool call succeeded");
                ToolOutcome::success(JsonValue::Array(result.content))
            }
            Err(e) => ToolOutcome::failure(
                ToolError::ExecutionFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
                .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::fake_server;
    use serde_json::json;

    fn notion_like(method: &str, params: &JsonValue) -> Option<JsonValue> {
        match method {
            "tools/list" => Some(json!({
                "tools": [
                    {
                        "name": "notion_search",
                        "description": "Search Notion pages",
                        "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
                    },
                    {"name": "notion_get_page"}
                ]
            })),
            "tools/call" if params["name"] == "notion_search" => Some(json!({
                "content": [{"type": "text", "text": "3 pages found"}]
            })),
            "tools/call" => Some(json!({
                "content": [{"type": "text", "text": "page not found"}],
                "isError": true
            })),
            _ => None,
        }
    }

    #[tokio::test]
    async fn list_tools_maps_descriptors() {
        let (client, _) = fake_server(notion_like, None);
        let gateway = McpToolGateway::new(client);

        let tools = gateway.list_tools().await.expect("list");
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "notion_search");
        assert_eq!(tools[0].description, "Search Notion pages");
        assert_eq!(tools[0].input_schema["properties"]["query"]["type"], "string");
        assert_eq!(tools[1].description, "");
    }

    #[tokio::test]
    async fn successful_call_carries_content_array() {
        let (client, _) = fake_server(notion_like, None);
        let gateway = McpToolGateway::new(client);

        let outcome = gateway
            .invoke("notion_search", json!({"query": "roadmap"}))
            .await;
        assert!(outcome.is_success());
        assert_eq!(
            outcome.data,
            Some(json!([{"type": "text", "text": "3 pages found"}]))
        );
    }

    #[tokio::test]
    async fn error_result_becomes_failure_with_text() {
        let (client, _) = fake_server(notion_like, None);
        let gateway = McpToolGateway::new(client);

        let outcome = gateway.invoke("notion_get_page", json!({"id": "x"})).await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.error.as_deref(), Some("page not found"));
    }

    #[tokio::test]
    async fn transport_failure_becomes_failure() {
        let (client, _) = fake_server(|_, _| None, Some(1));
        let gateway = McpToolGateway::new(client);

        let outcome = gateway.invoke("notion_search", json!({})).await;
        assert!(!outcome.is_success());
        let message = outcome.error.unwrap_or_default();
        assert!(message.contains("notion_search"));
        assert!(message.contains("connection closed"));
    }

    #[tokio::test]
    async fn list_failure_is_an_error() {
        let (client, _) = fake_server(
            |_, _| Some(json!({"code": -32603, "message": "internal"})),
            None,
        );
        let gateway = McpToolGateway::new(client);

        let report = gateway.list_tools().await.unwrap_err();
        assert_eq!(*report.current_context(), ToolError::ListFailed);
        let cause = report
            .iter_reports()
            .find_map(|r| r.downcast_current_context::<McpError>().cloned());
        assert_eq!(
            cause,
            Some(McpError::Rpc {
                code: -32603,
                message: "internal".to_string()
            })
        );
    }
}
