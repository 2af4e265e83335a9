//! LLM provider abstraction and OpenAI-compatible implementation.

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FinishReason,
        FunctionCall, FunctionObjectArgs,
    },
};
use std::collections::HashMap;

use async_trait::async_trait;
use proto::{LlmError, Role, ToolCall, ToolDefinition};
use serde_json::Value;
use tracing::debug;

/// A message in the model-facing chat history.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Originating call id when this is a tool result.
    pub tool_call_id: Option<String>,
    /// Tool calls proposed by an assistant message.
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::text(Role::Assistant, content)
    }

    /// Assistant message carrying a batch of proposed calls.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            ..Self::text(Role::Assistant, "")
        }
    }

    /// Tool output answering the call with `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::text(Role::Tool, content)
        }
    }
}

/// Request to the LLM
#[derive(Debug)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
}

/// Token usage reported by the LLM for a single call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    /// Accumulates another usage record into this one.
    pub fn add(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Response from the LLM
#[derive(Debug)]
pub enum ChatResponse {
    /// Final assistant text.
    Text(String, TokenUsage),
    /// Assistant proposed one or more tool calls.
    ToolCalls(Vec<ToolCall>, TokenUsage),
}

/// LLM provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends a chat request and returns either text or proposed tool calls.
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// OpenAI-compatible chat-completions provider (OpenAI, Ollama, OpenRouter, ...).
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    /// Creates a provider against the default OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
        }
    }

    /// Creates a provider against a custom OpenAI-compatible endpoint.
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
        let messages = req
            .messages
            .iter()
            .map(convert_message)
            .collect::<Result<Vec<_>, _>>()?;
        let tool_name_map = build_tool_name_map(&req.tools)?;
        let tools = req
            .tools
            .iter()
            .map(convert_tool)
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(&req.model).messages(messages);
        if !tools.is_empty() {
            builder.tools(tools);
        }
        let request = builder.build().map_err(serialization)?;

        debug!(
            model = %req.model,
            messages = req.messages.len(),
            tools = req.tools.len(),
            "Sending chat completion request"
        );

        let response = self.client.chat().create(request).await.map_err(|e| {
            let msg = e.to_string();
            debug!(error = %msg, "Chat completion failed");
            if msg.contains("429") || msg.to_lowercase().contains("rate limit") {
                LlmError::RateLimit
            } else {
                LlmError::Api(msg)
            }
        })?;

        let usage = response
            .usage
            .as_ref()
            .map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".into()))?;

        let proposed = choice.message.tool_calls.unwrap_or_default();
        if choice.finish_reason == Some(FinishReason::ToolCalls) || !proposed.is_empty() {
            let calls = convert_tool_calls(proposed, &tool_name_map);
            return Ok(ChatResponse::ToolCalls(calls, usage));
        }
        Ok(ChatResponse::Text(
            choice.message.content.unwrap_or_default(),
            usage,
        ))
    }
}

fn serialization(e: impl std::fmt::Display) -> LlmError {
    LlmError::Serialization(e.to_string())
}

/// Converts a chat message into the OpenAI request format.
fn convert_message(m: &ChatMessage) -> Result<ChatCompletionRequestMessage, LlmError> {
    let converted = match m.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(m.content.clone())
            .build()
            .map_err(serialization)?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(m.content.clone())
            .build()
            .map_err(serialization)?
            .into(),
        Role::Assistant => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            builder.content(m.content.clone());
            if let Some(calls) = &m.tool_calls {
                builder.tool_calls(
                    calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: sanitize_tool_name(&tc.name),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect::<Vec<_>>(),
                );
            }
            builder.build().map_err(serialization)?.into()
        }
        Role::Tool => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(m.tool_call_id.clone().unwrap_or_default())
            .content(m.content.clone())
            .build()
            .map_err(serialization)?
            .into(),
    };
    Ok(converted)
}

/// Converts a tool schema into an OpenAI function-tool declaration.
fn convert_tool(t: &ToolDefinition) -> Result<ChatCompletionTool, LlmError> {
    Ok(ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObjectArgs::default()
            .name(sanitize_tool_name(&t.name))
            .description(t.description.clone())
            .parameters(t.parameters.clone())
            .build()
            .map_err(serialization)?,
    })
}

/// Maps each sanitized tool name back to its registry name.
///
/// Two tools that sanitize to the same name would be routed wrongly, so the
/// request is refused instead.
fn build_tool_name_map(tools: &[ToolDefinition]) -> Result<HashMap<String, String>, LlmError> {
    let mut map = HashMap::with_capacity(tools.len());
    for t in tools {
        let sanitized = sanitize_tool_name(&t.name);
        if let Some(existing) = map.get(&sanitized)
            && existing != &t.name
        {
            return Err(LlmError::Api(format!(
                "Tool name collision: '{existing}' and '{}' both sanitize to '{sanitized}'",
                t.name
            )));
        }
        map.insert(sanitized, t.name.clone());
    }
    Ok(map)
}

/// Converts proposed calls, restoring registry tool names.
fn convert_tool_calls(
    proposed: Vec<ChatCompletionMessageToolCall>,
    tool_name_map: &HashMap<String, String>,
) -> Vec<ToolCall> {
    proposed
        .into_iter()
        .map(|tc| ToolCall {
            id: tc.id,
            arguments: parse_tool_arguments(&tc.function.arguments),
            name: tool_name_map
                .get(&tc.function.name)
                .cloned()
                .unwrap_or(tc.function.name),
        })
        .collect()
}

/// Sanitizes a tool name so it matches the OpenAI `^[a-zA-Z0-9_-]+$` pattern.
/// Other characters (e.g. `.`) become `_`.
fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Parses tool call argument JSON, falling back to an empty object.
fn parse_tool_arguments(arguments: &str) -> Value {
    serde_json::from_str(arguments).unwrap_or(Value::Object(Default::default()))
}
