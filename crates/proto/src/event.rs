use serde::{Deserialize, Serialize};

/// Real-time progress events emitted while a turn runs.
///
/// These are sent via `tokio::sync::mpsc` from
/// `AgentRuntime::process_with_progress()` so that a front end can show
/// model/tool status and the confirmation lifecycle as the loop proceeds.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The model is being consulted (round N of the loop).
    LlmThinking { round: usize },
    /// The orchestrator paused the turn to ask for approval.
    ConfirmationRequested { summary: String, call_count: usize },
    /// The pending batch was approved or cancelled.
    ConfirmationResolved { approved: bool },
    /// A tool call has been dispatched but has not yet completed.
    ToolCallStarted {
        call_id: String,
        tool_name: String,
        args: serde_json::Value,
    },
    /// A tool call has finished executing.
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
}

/// How a conversation turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model produced a final answer.
    Completed,
    /// The user cancelled a confirmation; no call in the batch ran.
    Cancelled,
    /// Confirmation could not be requested; the batch was aborted.
    ConfirmationFailed,
}

impl TurnStatus {
    /// Returns `true` when the reply should be presented as an error.
    pub fn is_error(self) -> bool {
        matches!(self, TurnStatus::ConfirmationFailed)
    }
}
