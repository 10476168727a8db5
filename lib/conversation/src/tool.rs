//! Tool gateway for conversation mode.
//!
//! Tools are external capabilities the model may ask for mid-conversation.
//! The catalog is discovered once at startup; invocations never fail past
//! the gateway, they come back as a [`ToolOutcome`] the model can read.

use crate::error::ToolError;
use async_trait::async_trait;
use relaybot_ai::{ContentBlock, ToolSpec};
use relaybot_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Definition of a tool available during conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema for input parameters.
    pub input_schema: JsonValue,
}

impl ToolDescriptor {
    /// Creates a new tool descriptor with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    /// Sets the input schema.
    #[must_use]
    pub fn with_input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }

    /// Converts to the format expected by the model API.
    #[must_use]
    pub fn to_spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

/// The immutable set of tools discovered at startup, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
}

impl ToolCatalog {
    /// Creates a catalog.
    #[must_use]
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self { tools }
    }

    /// Gets a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Returns all tools in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.iter()
    }

    /// Returns the tool names, in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Returns the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Converts all tools to the model API format.
    #[must_use]
    pub fn to_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(ToolDescriptor::to_spec).collect()
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Correlation id tying the request to its result.
    pub id: String,
    /// The tool name.
    pub name: String,
    /// Arguments for the tool.
    pub arguments: JsonValue,
}

impl ToolInvocation {
    /// Extracts an invocation from a tool-use block.
    #[must_use]
    pub fn from_block(block: &ContentBlock) -> Option<Self> {
        match block {
            ContentBlock::ToolUse { id, name, input } => Some(Self {
                id: id.clone(),
                name: name.clone(),
                arguments: input.clone(),
            }),
            _ => None,
        }
    }
}

/// Result of a tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the invocation succeeded.
    pub success: bool,
    /// Result data (if successful).
    pub data: Option<JsonValue>,
    /// Error message (if failed).
    pub error: Option<String>,
}

impl ToolOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn success(data: JsonValue) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Returns true if the invocation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Renders the outcome as the tool-result block for `tool_use_id`.
    ///
    /// Success carries the payload as JSON text; failure carries
    /// `{"error": message}` and sets the error flag.
    #[must_use]
    pub fn into_result_block(self, tool_use_id: impl Into<String>) -> ContentBlock {
        if self.success {
            let payload = self.data.unwrap_or(JsonValue::Null);
            ContentBlock::tool_result(tool_use_id, payload.to_string(), false)
        } else {
            let message = self.error.unwrap_or_else(|| "unknown error".to_string());
            let payload = serde_json::json!({ "error": message });
            ContentBlock::tool_result(tool_use_id, payload.to_string(), true)
        }
    }
}

/// Trait for the boundary to external tools.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Lists the available tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the tool provider cannot be reached or answers
    /// with something unusable.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

    /// Invokes a tool. Failures are returned as a failed outcome.
    async fn invoke(&self, name: &str, arguments: JsonValue) -> ToolOutcome;
}

/// Gateway for deployments without tool use.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

#[async_trait]
impl ToolGateway for NoTools {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        Ok(Vec::new())
    }

    async fn invoke(&self, name: &str, _arguments: JsonValue) -> ToolOutcome {
        ToolOutcome::failure(
            ToolError::NotFound {
                name: name.to_string(),
            }
            .to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_converts_to_spec() {
        let tool = ToolDescriptor::new("query_db", "Query a database").with_input_schema(json!({
            "type": "object",
            "properties": { "table": { "type": "string" } }
        }));

        let spec = tool.to_spec();
        assert_eq!(spec.name, "query_db");
        assert_eq!(spec.input_schema["properties"]["table"]["type"], "string");
    }

    #[test]
    fn catalog_keeps_discovery_order() {
        let catalog = ToolCatalog::new(vec![
            ToolDescriptor::new("b_tool", "second alphabetically"),
            ToolDescriptor::new("a_tool", "first alphabetically"),
        ]);

        assert_eq!(catalog.names(), vec!["b_tool", "a_tool"]);
        assert!(catalog.get("a_tool").is_some());
        assert!(catalog.get("missing").is_none());
        assert_eq!(catalog.to_specs().len(), 2);
    }

    #[test]
    fn invocation_from_tool_use_block() {
        let block = ContentBlock::tool_use("toolu_9", "query_db", json!({"table": "tasks"}));
        let invocation = ToolInvocation::from_block(&block).expect("tool use");
        assert_eq!(invocation.id, "toolu_9");
        assert_eq!(invocation.arguments["table"], "tasks");

        assert!(ToolInvocation::from_block(&ContentBlock::text("hi")).is_none());
    }

    #[test]
    fn success_outcome_serializes_payload() {
        let block = ToolOutcome::success(json!({"rows": [1, 2]})).into_result_block("toolu_1");
        assert_eq!(
            block,
            ContentBlock::tool_result("toolu_1", r#"{"rows":[1,2]}"#, false)
        );
    }

    #[test]
    fn failure_outcome_wraps_error_message() {
        let block = ToolOutcome::failure("database offline").into_result_block("toolu_2");
        match block {
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                assert_eq!(tool_use_id, "toolu_2");
                assert!(is_error);
                let payload: JsonValue = serde_json::from_str(&content).expect("json");
                assert_eq!(payload, json!({"error": "database offline"}));
            }
            other => panic!("unexpected block: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_tools_gateway_is_empty_and_fails_invocations() {
        let gateway = NoTools;
        assert!(gateway.list_tools().await.expect("list").is_empty());

        let outcome = gateway.invoke("anything", json!({})).await;
        assert!(!outcome.is_success());
        assert!(outcome.error.unwrap_or_default().contains("anything"));
    }
}
