//! Tool registry used by the runtime to list, describe, and execute tools.

use std::collections::BTreeMap;
use std::sync::Arc;

use proto::{ToolAction, ToolCall, ToolDefinition, ToolResult};
use tools::Tool;
use tracing::debug;

/// Registry of available tools, keyed by tool name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool, replacing any previous tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        debug!(tool = %name, sensitive = tool.is_sensitive(), "Registering tool");
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Tool definitions for the LLM, in name order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .map(|t| ToolDefinition::new(t.name(), t.description(), t.parameters_schema()))
            .collect()
    }

    /// Whether the named tool declares itself sensitive. Unknown tools are not.
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|t| t.is_sensitive())
    }

    /// Summary verb/noun for the named tool, falling back to a generic phrase.
    pub fn action(&self, name: &str) -> ToolAction {
        self.tools
            .get(name)
            .map(|t| t.action())
            .unwrap_or(ToolAction::new("run", "tool call"))
    }

    /// Human-readable description of one proposed call.
    pub fn describe_call(&self, call: &ToolCall) -> String {
        match self.tools.get(&call.name) {
            Some(tool) => tool.describe_call(&call.arguments),
            None => format!("Unknown tool '{}'", call.name),
        }
    }

    /// Execute a tool call
    pub async fn execute(&self, call_id: &str, name: &str, args: serde_json::Value) -> ToolResult {
        if let Some(tool) = self.tools.get(name) {
            debug!(tool = %name, call_id = %call_id, "Executing tool");
            tool.execute(call_id, args).await
        } else {
            ToolResult::structured_error(
                call_id,
                name,
                "tool_not_found",
                format!("Tool '{name}' not found"),
            )
        }
    }

    /// Returns the registered tool names in order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
