//! `email.send` tool: writes outgoing mail into a local outbox directory.

use std::path::PathBuf;

use async_trait::async_trait;
use proto::{ToolAction, ToolResult};
use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::Tool;

#[derive(Debug, Deserialize)]
struct EmailArgs {
    to: Recipients,
    subject: String,
    body: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    fn into_vec(self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr],
            Recipients::Many(addrs) => addrs,
        }
    }
}

/// Queues an email as an `.eml` file in the outbox. Sensitive; gated by the confirmation policy.
pub struct EmailSendTool {
    outbox: PathBuf,
    from: String,
}

impl EmailSendTool {
    pub fn new(outbox: impl Into<PathBuf>, from: impl Into<String>) -> Self {
        Self {
            outbox: outbox.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Tool for EmailSendTool {
    fn name(&self) -> &str {
        "email.send"
    }

    fn description(&self) -> &str {
        "Send an email. `to` may be a single address or a list. The user may be asked to confirm first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": {
                    "description": "Recipient address or list of addresses",
                    "oneOf": [
                        {"type": "string"},
                        {"type": "array", "items": {"type": "string"}}
                    ]
                },
                "subject": {"type": "string"},
                "body": {"type": "string"}
            },
            "required": ["to", "subject", "body"]
        })
    }

    fn is_sensitive(&self) -> bool {
        true
    }

    fn action(&self) -> ToolAction {
        ToolAction::new("send", "email")
    }

    fn describe_call(&self, args: &serde_json::Value) -> String {
        let to = match args.get("to") {
            Some(serde_json::Value::String(addr)) => addr.clone(),
            Some(serde_json::Value::Array(addrs)) => addrs
                .iter()
                .filter_map(|a| a.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            _ => "?".to_string(),
        };
        let subject = args.get("subject").and_then(|s| s.as_str()).unwrap_or("");
        format!("Email {to}: \"{subject}\"")
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let args: EmailArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let recipients = args.to.into_vec();
        if recipients.is_empty() {
            return ToolResult::structured_error(
                call_id,
                self.name(),
                "invalid_recipient",
                "at least one recipient is required",
            );
        }
        if let Some(bad) = recipients.iter().find(|r| !is_valid_address(r)) {
            return ToolResult::structured_error(
                call_id,
                self.name(),
                "invalid_recipient",
                format!("'{bad}' is not a valid email address"),
            );
        }
        if args.subject.chars().any(char::is_control) {
            return ToolResult::structured_error(
                call_id,
                self.name(),
                "invalid_subject",
                "subject must be a single line without control characters",
            );
        }

        let message_id = Uuid::new_v4();
        let message = render_message(&self.from, &recipients, &args.subject, &args.body, message_id);
        let file_name = format!(
            "{}-{}.eml",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            message_id.simple()
        );

        if let Err(e) = tokio::fs::create_dir_all(&self.outbox).await {
            warn!(outbox = %self.outbox.display(), error = %e, "Cannot create outbox");
            return ToolResult::error(call_id, self.name(), format!("Outbox unavailable: {e}"));
        }
        let path = self.outbox.join(file_name);
        match tokio::fs::write(&path, message).await {
            Ok(()) => {
                debug!(path = %path.display(), recipients = recipients.len(), "Email queued");
                ToolResult::success(
                    call_id,
                    self.name(),
                    format!("Sent to {} (message id {message_id})", recipients.join(", ")),
                )
            }
            Err(e) => ToolResult::error(call_id, self.name(), format!("Send failed: {e}")),
        }
    }
}

/// Minimal address check: one `@`, non-empty local part, dotted domain, no whitespace.
fn is_valid_address(addr: &str) -> bool {
    let Some((local, domain)) = addr.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !addr.chars().any(char::is_whitespace)
}

fn render_message(
    from: &str,
    recipients: &[String],
    subject: &str,
    body: &str,
    message_id: Uuid,
) -> String {
    format!(
        "From: {from}\r\nTo: {}\r\nSubject: {subject}\r\nDate: {}\r\nMessage-ID: <{message_id}@toolgate.local>\r\n\r\n{body}\r\n",
        recipients.join(", "),
        chrono::Utc::now().to_rfc2822(),
    )
}
