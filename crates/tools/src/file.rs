//! Workspace file tools: `file.read` and `file.delete`.

use async_trait::async_trait;
use proto::{ToolAction, ToolResult};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Tool, Workspace};

const MAX_READ_CHARS: usize = 10_000;

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

fn path_schema(description: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": description
            }
        },
        "required": ["path"]
    })
}

fn path_arg(args: &serde_json::Value) -> &str {
    args.get("path").and_then(|v| v.as_str()).unwrap_or("?")
}

/// Reads a UTF-8 text file from the workspace.
pub struct FileReadTool {
    workspace: Workspace,
}

impl FileReadTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file.read"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace. Output is limited to 10,000 characters."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        path_schema("Path relative to the workspace root")
    }

    fn action(&self) -> ToolAction {
        ToolAction::new("read", "file")
    }

    fn describe_call(&self, args: &serde_json::Value) -> String {
        format!("Read {}", path_arg(args))
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let args: PathArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let path = match self.workspace.resolve(&args.path) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::structured_error(
                    call_id,
                    self.name(),
                    e.code(),
                    e.to_string(),
                );
            }
        };

        debug!(path = %path.display(), "Reading file");
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => ToolResult::success(call_id, self.name(), truncate(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ToolResult::structured_error(
                call_id,
                self.name(),
                "not_found",
                format!("{} does not exist", args.path),
            ),
            Err(e) => ToolResult::error(call_id, self.name(), format!("Read failed: {e}")),
        }
    }
}

/// Deletes a file from the workspace. Sensitive; gated by the confirmation policy.
pub struct FileDeleteTool {
    workspace: Workspace,
}

impl FileDeleteTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[async_trait]
impl Tool for FileDeleteTool {
    fn name(&self) -> &str {
        "file.delete"
    }

    fn description(&self) -> &str {
        "Permanently delete a file from the workspace. The user may be asked to confirm first."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        path_schema("Path of the file to delete, relative to the workspace root")
    }

    fn is_sensitive(&self) -> bool {
        true
    }

    fn action(&self) -> ToolAction {
        ToolAction::new("delete", "file")
    }

    fn describe_call(&self, args: &serde_json::Value) -> String {
        format!("Delete {}", path_arg(args))
    }

    async fn execute(&self, call_id: &str, args: serde_json::Value) -> ToolResult {
        let args: PathArgs = match serde_json::from_value(args) {
            Ok(a) => a,
            Err(e) => {
                return ToolResult::error(call_id, self.name(), format!("Invalid arguments: {e}"));
            }
        };
        let path = match self.workspace.resolve(&args.path) {
            Ok(p) => p,
            Err(e) => {
                return ToolResult::structured_error(
                    call_id,
                    self.name(),
                    e.code(),
                    e.to_string(),
                );
            }
        };

        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            return ToolResult::structured_error(
                call_id,
                self.name(),
                "is_directory",
                format!("{} is a directory", args.path),
            );
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Deleted file");
                ToolResult::success(call_id, self.name(), format!("Deleted {}", args.path))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => ToolResult::structured_error(
                call_id,
                self.name(),
                "not_found",
                format!("{} does not exist", args.path),
            ),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Delete failed");
                ToolResult::error(call_id, self.name(), format!("Delete failed: {e}"))
            }
        }
    }
}

/// Truncates file content to [`MAX_READ_CHARS`] code points.
fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_READ_CHARS {
        s.to_string()
    } else {
        let kept: String = s.chars().take(MAX_READ_CHARS).collect();
        format!("{kept}\n[... truncated at {MAX_READ_CHARS} chars]")
    }
}
