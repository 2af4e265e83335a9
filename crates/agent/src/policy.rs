//! Decides which tool-call batches need a human decision and builds the
//! confirmation shown to the user.

use std::collections::HashSet;

use proto::{PendingConfirmation, PendingToolCall, ToolCall};
use serde::{Deserialize, Serialize};

use crate::tool_registry::ToolRegistry;

/// When the runtime pauses for confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationMode {
    /// Pause when any call in the batch targets a sensitive tool.
    #[default]
    Sensitive,
    /// Pause before every batch.
    Always,
    /// Never pause.
    Never,
}

/// Confirmation gating rules.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationPolicy {
    mode: ConfirmationMode,
    extra_sensitive: HashSet<String>,
    trusted: HashSet<String>,
}

impl ConfirmationPolicy {
    pub fn new(mode: ConfirmationMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Treats these tools as sensitive even if they do not declare it.
    pub fn with_extra_sensitive<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_sensitive.extend(names.into_iter().map(Into::into));
        self
    }

    /// Never asks for these tools, even if they declare themselves sensitive.
    pub fn with_trusted<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether a single tool is gated under this policy.
    pub fn is_sensitive(&self, registry: &ToolRegistry, tool_name: &str) -> bool {
        if self.trusted.contains(tool_name) {
            return false;
        }
        registry.is_sensitive(tool_name) || self.extra_sensitive.contains(tool_name)
    }

    /// Whether the batch must be approved before any of it runs.
    pub fn requires_confirmation(&self, registry: &ToolRegistry, calls: &[ToolCall]) -> bool {
        if calls.is_empty() {
            return false;
        }
        match self.mode {
            ConfirmationMode::Never => false,
            ConfirmationMode::Always => true,
            ConfirmationMode::Sensitive => {
                calls.iter().any(|c| self.is_sensitive(registry, &c.name))
            }
        }
    }

    /// Builds the confirmation for the whole batch, preserving call order.
    pub fn build_pending(&self, registry: &ToolRegistry, calls: &[ToolCall]) -> PendingConfirmation {
        let tool_calls = calls
            .iter()
            .map(|c| PendingToolCall::from_call(c, registry.describe_call(c)))
            .collect();
        PendingConfirmation::new(summarize(registry, calls), tool_calls)
    }
}

/// Summarises a batch, e.g. "About to send 2 emails and delete 1 file".
///
/// Calls are grouped per tool in first-appearance order.
pub fn summarize(registry: &ToolRegistry, calls: &[ToolCall]) -> String {
    let mut groups: Vec<(&str, usize)> = Vec::new();
    for call in calls {
        match groups.iter_mut().find(|(name, _)| *name == call.name) {
            Some((_, count)) => *count += 1,
            None => groups.push((call.name.as_str(), 1)),
        }
    }
    if groups.is_empty() {
        return "No actions proposed".to_string();
    }

    let phrases: Vec<String> = groups
        .iter()
        .map(|(name, count)| registry.action(name).phrase(*count))
        .collect();
    format!("About to {}", join_phrases(&phrases))
}

/// Joins as "a", "a and b", "a, b and c".
fn join_phrases(phrases: &[String]) -> String {
    match phrases {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    }
}
