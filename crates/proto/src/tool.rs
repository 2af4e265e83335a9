//! Tool call, definition, and result types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tool invocation proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id assigned by the model (or generated locally).
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// JSON arguments for the call.
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Creates a call with a freshly generated id.
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: format!("call_{}", Uuid::new_v4().simple()),
            name: name.into(),
            arguments,
        }
    }
}

/// Tool schema advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of accepted arguments.
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Verb/noun pair describing what a tool does, e.g. `send` / `email`.
///
/// Used to build confirmation summaries such as "send 2 emails".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolAction {
    pub verb: &'static str,
    pub noun: &'static str,
}

impl ToolAction {
    pub const fn new(verb: &'static str, noun: &'static str) -> Self {
        Self { verb, noun }
    }

    /// Renders "<verb> <count> <noun>[s]".
    pub fn phrase(&self, count: usize) -> String {
        let plural = if count == 1 { "" } else { "s" };
        format!("{} {count} {}{plural}", self.verb, self.noun)
    }
}

/// How a failed tool call reported its error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolFailure {
    /// Machine-readable error with a stable code.
    Structured { code: String, message: String },
    /// Free-form error text.
    Message(String),
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolFailure::Structured { code, message } => write!(f, "[{code}] {message}"),
            ToolFailure::Message(message) => f.write_str(message),
        }
    }
}

/// Outcome of one executed tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the originating [`ToolCall`].
    pub call_id: String,
    pub tool_name: String,
    /// Output text, or the serialized error when `is_error` is set.
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: output.into(),
            is_error: false,
        }
    }

    /// Failure carrying a free-form message.
    pub fn error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: message.into(),
            is_error: true,
        }
    }

    /// Failure carrying a `{code, message}` payload.
    pub fn structured_error(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        let payload = serde_json::json!({ "code": code, "message": message.into() });
        Self {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            output: payload.to_string(),
            is_error: true,
        }
    }

    /// Parses the error payload, or `None` for successful results.
    pub fn failure(&self) -> Option<ToolFailure> {
        self.is_error.then(|| parse_failure(&self.output))
    }
}

/// Interprets stored error output as structured when it is a `{code, message}` object.
pub fn parse_failure(output: &str) -> ToolFailure {
    match serde_json::from_str::<ToolFailure>(output) {
        Ok(failure @ ToolFailure::Structured { .. }) => failure,
        _ => ToolFailure::Message(output.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_call_new_generates_unique_ids() {
        let a = ToolCall::new("file.read", serde_json::json!({}));
        let b = ToolCall::new("file.read", serde_json::json!({}));
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn action_phrase_pluralises() {
        let action = ToolAction::new("delete", "file");
        assert_eq!(action.phrase(1), "delete 1 file");
        assert_eq!(action.phrase(3), "delete 3 files");
    }

    #[test]
    fn success_has_no_failure() {
        let result = ToolResult::success("c1", "file.read", "hello");
        assert!(result.failure().is_none());
    }

    #[test]
    fn structured_error_parses_back() {
        let result =
            ToolResult::structured_error("c1", "email.send", "invalid_recipient", "bad address");
        assert!(result.is_error);
        assert_eq!(
            result.failure(),
            Some(ToolFailure::Structured {
                code: "invalid_recipient".to_string(),
                message: "bad address".to_string(),
            })
        );
        assert_eq!(
            result.failure().expect("failure").to_string(),
            "[invalid_recipient] bad address"
        );
    }

    #[test]
    fn string_error_stays_plain() {
        let result = ToolResult::error("c1", "file.delete", "disk on fire");
        assert_eq!(
            result.failure(),
            Some(ToolFailure::Message("disk on fire".to_string()))
        );
    }

    #[test]
    fn json_without_code_is_treated_as_plain_text() {
        let failure = parse_failure(r#"{"reason":"nope"}"#);
        assert_eq!(failure, ToolFailure::Message(r#"{"reason":"nope"}"#.to_string()));
    }
}
