//! Tool trait and built-in tool implementations.
//!
//! The agent runtime uses this crate to expose executable capabilities to the
//! model. Tools that change state outside the conversation (deleting files,
//! sending mail) declare themselves sensitive so the runtime pauses for a
//! human decision before running them.

pub mod email;
pub mod file;
mod workspace;

pub use email::EmailSendTool;
pub use file::{FileDeleteTool, FileReadTool};
pub use workspace::Workspace;

use async_trait::async_trait;
use proto::{ToolAction, ToolResult};

/// Trait that all tools must implement
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name exposed to the LLM.
    fn name(&self) -> &str;
    /// Human-readable description for tool selection.
    fn description(&self) -> &str;
    /// JSON schema for accepted tool arguments.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Whether calls to this tool need a human decision before running.
    fn is_sensitive(&self) -> bool {
        false
    }

    /// Verb/noun used when summarising a batch of calls.
    fn action(&self) -> ToolAction {
        ToolAction::new("run", "tool call")
    }

    /// One-line description of a specific call, shown on the confirmation card.
    fn describe_call(&self, args: &serde_json::Value) -> String {
        format!("{} {args}", self.name())
    }

    /// Executes the tool with the given call id and JSON args.
    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult;
}
