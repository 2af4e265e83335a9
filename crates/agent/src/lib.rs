//! Orchestrator runtime, confirmation relay, memory layer, and LLM adapter interfaces.

pub mod llm;
pub mod memory;
pub mod policy;
pub mod relay;
pub mod runtime;
pub mod tool_registry;

/// Chat request/response models and provider interfaces.
pub use llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, OpenAiProvider, TokenUsage};
/// SQLite-backed conversation memory implementation.
pub use memory::SqliteMemory;
/// Rules deciding which batches need a human decision.
pub use policy::{ConfirmationMode, ConfirmationPolicy};
/// Single-slot confirmation handoff between runtime and front end.
pub use relay::{ChannelConfirmationHandler, ConfirmationRelay, ConfirmationTicket};
/// Main runtime orchestration loop.
pub use runtime::{AgentRuntime, TurnOutcome};
/// Runtime tool registry.
pub use tool_registry::ToolRegistry;
