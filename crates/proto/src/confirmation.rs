//! Confirmation types shared between the orchestrator and interactive front ends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::tool::ToolCall;

/// One proposed invocation inside a confirmation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingToolCall {
    /// Tool-call identifier from the model.
    pub id: String,
    pub tool_name: String,
    /// Human-readable description of this particular call.
    pub description: String,
    pub tool_args: serde_json::Value,
}

impl PendingToolCall {
    /// Builds a pending entry from a proposed call and its description.
    pub fn from_call(call: &ToolCall, description: impl Into<String>) -> Self {
        Self {
            id: call.id.clone(),
            tool_name: call.name.clone(),
            description: description.into(),
            tool_args: call.arguments.clone(),
        }
    }
}

/// A batch of tool calls awaiting a single approve/cancel decision.
///
/// `tool_calls` keeps the order in which the model proposed them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    /// Summary of the whole batch, e.g. "About to send 2 emails and delete 1 file".
    pub summary: String,
    pub tool_calls: Vec<PendingToolCall>,
}

impl PendingConfirmation {
    pub fn new(summary: impl Into<String>, tool_calls: Vec<PendingToolCall>) -> Self {
        Self {
            summary: summary.into(),
            tool_calls,
        }
    }

    /// Returns the call ids in proposal order.
    pub fn call_ids(&self) -> Vec<&str> {
        self.tool_calls.iter().map(|c| c.id.as_str()).collect()
    }
}

/// Asks a human to approve a batch of tool calls.
///
/// Front ends implement this to present the batch and wait for the user.
/// `true` means approved, `false` means cancelled; a handler that can no
/// longer reach its user must answer `false` rather than wait forever.
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, pending: PendingConfirmation) -> bool;
}

/// Handler that approves every batch without asking.
///
/// Used by `run --yes` and tests.
pub struct AutoConfirmHandler;

#[async_trait]
impl ConfirmationHandler for AutoConfirmHandler {
    async fn confirm(&self, _pending: PendingConfirmation) -> bool {
        true
    }
}
