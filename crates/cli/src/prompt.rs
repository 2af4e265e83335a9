//! Line-based confirmation prompt for `toolgate run`.

use async_trait::async_trait;
use proto::{ConfirmationHandler, PendingConfirmation};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt};
use tracing::warn;

/// Asks on stdout and reads `y`/`n` from stdin.
///
/// End of input or a read error counts as a cancel.
pub struct StdinConfirmationHandler;

#[async_trait]
impl ConfirmationHandler for StdinConfirmationHandler {
    async fn confirm(&self, pending: PendingConfirmation) -> bool {
        let mut stdout = tokio::io::stdout();
        let prompt = render_confirmation(&pending);
        if let Err(e) = stdout.write_all(prompt.as_bytes()).await {
            warn!(error = %e, "Failed to write confirmation prompt");
            return false;
        }
        let _ = stdout.flush().await;

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        match stdin.lines().next_line().await {
            Ok(Some(line)) => parse_answer(&line),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Failed to read confirmation answer");
                false
            }
        }
    }
}

/// Text block shown before reading the answer.
pub fn render_confirmation(pending: &PendingConfirmation) -> String {
    let mut out = format!("\n{}\n", pending.summary);
    for (i, call) in pending.tool_calls.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, call.description));
        out.push_str(&format!("     {}\n", call.tool_args));
    }
    out.push_str("Proceed? [y/N] ");
    out
}

/// Only an explicit yes approves.
pub fn parse_answer(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
