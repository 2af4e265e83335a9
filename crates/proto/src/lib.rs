//! Shared protocol types for the orchestrator, tools, and front ends.
//!
//! This crate defines serializable message/tool/confirmation structures and
//! strongly-typed error enums shared across the workspace.

pub mod confirmation;
pub mod error;
pub mod event;
pub mod message;
pub mod tool;

/// Re-export of confirmation batch types and the handler trait.
pub use confirmation::{
    AutoConfirmHandler, ConfirmationHandler, PendingConfirmation, PendingToolCall,
};
/// Re-export of all protocol error types.
pub use error::*;
/// Re-export of progress/outcome event types.
pub use event::{ProgressEvent, TurnStatus};
/// Re-export of conversation/message identity types.
pub use message::{AgentMessage, ChannelId, Role, SessionId};
/// Re-export of tool call definition and result types.
pub use tool::{ToolAction, ToolCall, ToolDefinition, ToolFailure, ToolResult};
