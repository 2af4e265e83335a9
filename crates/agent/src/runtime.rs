//! Conversation loop: model calls, confirmation gating, tool execution, memory.

use std::sync::Arc;

use proto::{
    AgentMessage, ChannelId, LlmError, ProgressEvent, Role, SessionId, ToolCall, TurnStatus,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    llm::{ChatMessage, ChatRequest, ChatResponse, LlmProvider, TokenUsage},
    memory::SqliteMemory,
    policy::ConfirmationPolicy,
    relay::ConfirmationRelay,
    tool_registry::ToolRegistry,
};

const SYSTEM_PROMPT: &str = "You are toolgate, a helpful assistant that can act through tools.
Some tools change things outside this conversation. Calls to them are shown to the user for \
approval before they run; if the user declines, do not retry the same action unless asked.";
const MAX_CONTEXT_MESSAGES: usize = 40;
const MAX_TOOL_RESULT_CHARS: usize = 16_000;

/// Result of one user turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Final assistant text shown to the user.
    pub text: String,
    pub status: TurnStatus,
    /// Tokens consumed across every model call in the turn.
    pub usage: TokenUsage,
}

impl TurnOutcome {
    fn new(text: String, status: TurnStatus, usage: TokenUsage) -> Self {
        Self {
            text,
            status,
            usage,
        }
    }
}

/// The main agent runtime: manages the ReAct loop
pub struct AgentRuntime {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<ToolRegistry>,
    memory: Arc<SqliteMemory>,
    policy: ConfirmationPolicy,
    relay: Arc<ConfirmationRelay>,
    model: String,
    max_tool_rounds: usize,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        tools: Arc<ToolRegistry>,
        memory: Arc<SqliteMemory>,
        policy: ConfirmationPolicy,
        relay: Arc<ConfirmationRelay>,
        model: impl Into<String>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            memory,
            policy,
            relay,
            model: model.into(),
            max_tool_rounds,
        }
    }

    /// Relay this runtime asks before running gated batches.
    pub fn relay(&self) -> &Arc<ConfirmationRelay> {
        &self.relay
    }

    pub fn memory(&self) -> &Arc<SqliteMemory> {
        &self.memory
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Drops the stored history of a session. Returns the number of removed messages.
    pub async fn reset_session(&self, session_id: &SessionId) -> Result<u64, proto::Error> {
        let removed = self.memory.clear_session(session_id).await?;
        info!(session = %session_id, removed, "Session history cleared");
        Ok(removed)
    }

    /// Runs one user turn to completion.
    pub async fn process(
        &self,
        channel_id: &ChannelId,
        session_id: &SessionId,
        user_message: &str,
    ) -> Result<TurnOutcome, proto::Error> {
        self.run_turn(channel_id, session_id, user_message, None)
            .await
    }

    /// Same as [`process`](Self::process), additionally emitting
    /// [`ProgressEvent`]s so a front end can follow the turn live.
    pub async fn process_with_progress(
        &self,
        channel_id: &ChannelId,
        session_id: &SessionId,
        user_message: &str,
        progress_tx: mpsc::Sender<ProgressEvent>,
    ) -> Result<TurnOutcome, proto::Error> {
        self.run_turn(channel_id, session_id, user_message, Some(&progress_tx))
            .await
    }

    async fn run_turn(
        &self,
        channel_id: &ChannelId,
        session_id: &SessionId,
        user_message: &str,
        progress: Option<&mpsc::Sender<ProgressEvent>>,
    ) -> Result<TurnOutcome, proto::Error> {
        let emit = |event: ProgressEvent| {
            if let Some(tx) = progress
                && tx.try_send(event).is_err()
            {
                debug!("Progress receiver full or closed, dropping event");
            }
        };

        self.memory
            .ensure_session(session_id, channel_id.as_str())
            .await?;
        self.memory
            .append_message(&AgentMessage::new(
                session_id.clone(),
                Role::User,
                user_message,
            ))
            .await?;

        let history = trim_session_history(self.memory.load_session(session_id).await?);
        let mut messages = history_to_chat_messages(SYSTEM_PROMPT, &history);

        let tool_defs = self.tools.definitions();
        let mut total_usage = TokenUsage::default();

        for round in 0..self.max_tool_rounds {
            emit(ProgressEvent::LlmThinking { round });
            let req = ChatRequest {
                messages: messages.clone(),
                tools: tool_defs.clone(),
                model: self.model.clone(),
            };
            let t0 = std::time::Instant::now();
            let response = self.llm.chat(req).await?;
            debug!(elapsed_ms = %t0.elapsed().as_millis(), round, "LLM response received");

            let tool_calls = match response {
                ChatResponse::Text(text, usage) => {
                    total_usage.add(&usage);
                    return self
                        .finish(session_id, text, TurnStatus::Completed, total_usage)
                        .await;
                }
                ChatResponse::ToolCalls(calls, usage) => {
                    total_usage.add(&usage);
                    calls
                }
            };
            debug!(
                tools = ?tool_calls.iter().map(|tc| &tc.name).collect::<Vec<_>>(),
                "Tool calls proposed"
            );

            if self.policy.requires_confirmation(&self.tools, &tool_calls) {
                let pending = self.policy.build_pending(&self.tools, &tool_calls);
                emit(ProgressEvent::ConfirmationRequested {
                    summary: pending.summary.clone(),
                    call_count: pending.tool_calls.len(),
                });

                match self.relay.request_confirmation(pending).await {
                    Ok(true) => {
                        emit(ProgressEvent::ConfirmationResolved { approved: true });
                        info!(session = %session_id, calls = tool_calls.len(), "Batch approved");
                    }
                    Ok(false) => {
                        emit(ProgressEvent::ConfirmationResolved { approved: false });
                        info!(session = %session_id, calls = tool_calls.len(), "Batch cancelled");
                        let text = cancellation_message(&self.tools, &tool_calls);
                        return self
                            .finish(session_id, text, TurnStatus::Cancelled, total_usage)
                            .await;
                    }
                    Err(e) => {
                        warn!(session = %session_id, error = %e, "Confirmation unavailable");
                        let text = format!(
                            "Could not request confirmation: {e}. No actions were performed."
                        );
                        return self
                            .finish(
                                session_id,
                                text,
                                TurnStatus::ConfirmationFailed,
                                total_usage,
                            )
                            .await;
                    }
                }
            }

            self.memory
                .append_message(&AgentMessage::assistant_tool_calls(
                    session_id.clone(),
                    tool_calls.clone(),
                ))
                .await?;
            messages.push(ChatMessage::assistant_tool_calls(tool_calls.clone()));

            for tc in &tool_calls {
                emit(ProgressEvent::ToolCallStarted {
                    call_id: tc.id.clone(),
                    tool_name: tc.name.clone(),
                    args: tc.arguments.clone(),
                });
                let result = self
                    .tools
                    .execute(&tc.id, &tc.name, tc.arguments.clone())
                    .await;
                if result.is_error {
                    debug!(tool = %tc.name, output = %result.output, "Tool call failed");
                }
                emit(ProgressEvent::ToolCallFinished {
                    call_id: tc.id.clone(),
                    tool_name: tc.name.clone(),
                    output: result.output.clone(),
                    is_error: result.is_error,
                });

                self.memory
                    .append_message(&AgentMessage::tool_result(
                        session_id.clone(),
                        &tc.id,
                        &tc.name,
                        &result.output,
                    ))
                    .await?;
                messages.push(ChatMessage::tool_result(
                    &tc.id,
                    truncate_tool_result(&result.output, MAX_TOOL_RESULT_CHARS),
                ));
            }
        }

        warn!(
            "Max tool rounds ({}) reached for session {session_id}",
            self.max_tool_rounds
        );
        Err(proto::Error::Llm(LlmError::MaxToolRoundsExceeded))
    }

    /// Persists the closing assistant message and builds the outcome.
    async fn finish(
        &self,
        session_id: &SessionId,
        text: String,
        status: TurnStatus,
        usage: TokenUsage,
    ) -> Result<TurnOutcome, proto::Error> {
        self.memory
            .append_message(&AgentMessage::new(
                session_id.clone(),
                Role::Assistant,
                &text,
            ))
            .await?;
        self.memory.touch_session(session_id).await?;
        info!(
            session = %session_id,
            ?status,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "Turn finished"
        );
        Ok(TurnOutcome::new(text, status, usage))
    }
}

/// Reply listing every call of a declined batch.
fn cancellation_message(registry: &ToolRegistry, calls: &[ToolCall]) -> String {
    let mut text =
        String::from("Cancelled. The following actions were not performed:");
    for call in calls {
        text.push_str("\n- ");
        text.push_str(&registry.describe_call(call));
    }
    text
}

/// Keeps at most the last [`MAX_CONTEXT_MESSAGES`] messages, starting on a
/// user message so no tool result is separated from its call.
fn trim_session_history(history: Vec<AgentMessage>) -> Vec<AgentMessage> {
    if history.len() <= MAX_CONTEXT_MESSAGES {
        return history;
    }
    let start = history.len() - MAX_CONTEXT_MESSAGES;
    let offset = history[start..]
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(0);
    history.into_iter().skip(start + offset).collect()
}

fn history_to_chat_messages(system_prompt: &str, history: &[AgentMessage]) -> Vec<ChatMessage> {
    let mut messages = vec![ChatMessage::system(system_prompt)];
    for msg in history {
        match msg.role {
            Role::User => messages.push(ChatMessage::user(&msg.content)),
            Role::Assistant => match &msg.tool_calls {
                Some(calls) => messages.push(ChatMessage::assistant_tool_calls(calls.clone())),
                None => messages.push(ChatMessage::assistant(&msg.content)),
            },
            Role::Tool => messages.push(ChatMessage::tool_result(
                msg.tool_call_id.as_deref().unwrap_or_default(),
                truncate_tool_result(&msg.content, MAX_TOOL_RESULT_CHARS),
            )),
            Role::System => {}
        }
    }
    messages
}

/// Caps tool output at `max_chars` characters, noting how much was cut.
fn truncate_tool_result(output: &str, max_chars: usize) -> String {
    let total = output.chars().count();
    if total <= max_chars {
        return output.to_string();
    }
    let kept: String = output.chars().take(max_chars).collect();
    format!("{kept}\n...[output truncated: {} chars omitted]", total - max_chars)
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use async_trait::async_trait;
    use proto::{AutoConfirmHandler, ToolFailure};
    use tools::{FileDeleteTool, FileReadTool, Workspace};

    use super::*;
    use crate::{
        policy::ConfirmationMode,
        relay::{ChannelConfirmationHandler, ConfirmationTicket},
    };

    struct MockLlm {
        queue: Mutex<VecDeque<ChatResponse>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl MockLlm {
        fn new(responses: Vec<ChatResponse>) -> Arc<Self> {
            Arc::new(Self {
                queue: Mutex::new(VecDeque::from(responses)),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn remaining(&self) -> usize {
            self.queue.lock().expect("lock queue").len()
        }

        fn requested_models(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("lock requests")
                .iter()
                .map(|r| r.model.clone())
                .collect()
        }

        fn last_request_messages(&self) -> Vec<ChatMessage> {
            self.requests
                .lock()
                .expect("lock requests")
                .last()
                .map(|r| r.messages.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmProvider for MockLlm {
        async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.requests.lock().expect("lock requests").push(req);
            self.queue
                .lock()
                .expect("lock queue")
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse("No mock response left".to_string()))
        }
    }

    struct Fixture {
        runtime: Arc<AgentRuntime>,
        llm: Arc<MockLlm>,
        workspace: tempfile::TempDir,
    }

    async fn open_temp_memory() -> Arc<SqliteMemory> {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let db_path = tempdir.path().join("memory.db");
        let memory = SqliteMemory::open(&db_path.to_string_lossy())
            .await
            .expect("memory open");
        // Keep tempdir alive for test process lifetime.
        std::mem::forget(tempdir);
        Arc::new(memory)
    }

    async fn fixture(
        responses: Vec<ChatResponse>,
        policy: ConfirmationPolicy,
        relay: Arc<ConfirmationRelay>,
    ) -> Fixture {
        let workspace = tempfile::tempdir().expect("workspace");
        let ws = Workspace::new(workspace.path());
        let mut registry = ToolRegistry::new();
        registry.register(FileReadTool::new(ws.clone()));
        registry.register(FileDeleteTool::new(ws));

        let llm = MockLlm::new(responses);
        let runtime = AgentRuntime::new(
            llm.clone(),
            Arc::new(registry),
            open_temp_memory().await,
            policy,
            relay,
            "test-model",
            4,
        );
        Fixture {
            runtime: Arc::new(runtime),
            llm,
            workspace,
        }
    }

    fn delete_call(path: &str) -> ToolCall {
        ToolCall {
            id: "call-delete".to_string(),
            name: "file.delete".to_string(),
            arguments: serde_json::json!({ "path": path }),
        }
    }

    fn text(s: &str) -> ChatResponse {
        ChatResponse::Text(s.to_string(), TokenUsage::default())
    }

    fn calls(calls: Vec<ToolCall>) -> ChatResponse {
        ChatResponse::ToolCalls(calls, TokenUsage::default())
    }

    fn channel_relay() -> (Arc<ConfirmationRelay>, mpsc::Receiver<ConfirmationTicket>) {
        let (handler, rx) = ChannelConfirmationHandler::new();
        (
            Arc::new(ConfirmationRelay::with_handler(Arc::new(handler))),
            rx,
        )
    }

    fn spawn_turn(
        runtime: &Arc<AgentRuntime>,
        session: &SessionId,
        message: &str,
    ) -> tokio::task::JoinHandle<Result<TurnOutcome, proto::Error>> {
        let runtime = Arc::clone(runtime);
        let session = session.clone();
        let message = message.to_string();
        tokio::spawn(async move {
            runtime
                .process(&ChannelId::new("test", "main"), &session, &message)
                .await
        })
    }

    #[tokio::test]
    async fn text_reply_is_persisted() {
        let f = fixture(
            vec![ChatResponse::Text(
                "hello".to_string(),
                TokenUsage {
                    prompt_tokens: 3,
                    completion_tokens: 2,
                },
            )],
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
        )
        .await;
        let session = SessionId::from("s-text");

        let outcome = f
            .runtime
            .process(&ChannelId::new("test", "main"), &session, "hi")
            .await
            .expect("turn");
        assert_eq!(outcome.text, "hello");
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert_eq!(outcome.usage.prompt_tokens, 3);
        assert_eq!(f.llm.requested_models(), vec!["test-model".to_string()]);
        assert_eq!(f.runtime.model(), "test-model");

        let stored = f.runtime.memory().load_session(&session).await.expect("load");
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn approved_delete_runs_and_records_result() {
        let (relay, mut tickets) = channel_relay();
        let f = fixture(
            vec![calls(vec![delete_call("X")]), text("Deleted X for you.")],
            ConfirmationPolicy::default(),
            relay,
        )
        .await;
        let target = f.workspace.path().join("X");
        std::fs::write(&target, "bye").expect("seed file");
        let session = SessionId::from("s-approve");

        let turn = spawn_turn(&f.runtime, &session, "delete file X");
        let mut ticket = tickets.recv().await.expect("ticket");
        assert!(ticket.pending().summary.contains("delete"));
        assert_eq!(ticket.pending().tool_calls.len(), 1);
        assert_eq!(ticket.pending().tool_calls[0].description, "Delete X");
        assert!(target.exists(), "nothing runs before approval");
        assert!(ticket.confirm());

        let outcome = turn.await.expect("join").expect("turn");
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert!(!target.exists());

        let stored = f.runtime.memory().load_session(&session).await.expect("load");
        let results: Vec<_> = stored.iter().filter(|m| m.role == Role::Tool).collect();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id.as_deref(), Some("call-delete"));
        assert_eq!(results[0].content, "Deleted X");

        let forwarded = f.llm.last_request_messages();
        assert!(
            forwarded
                .iter()
                .any(|m| m.role == Role::Tool && m.tool_call_id.as_deref() == Some("call-delete"))
        );
    }

    #[tokio::test]
    async fn cancelled_batch_runs_nothing() {
        let (relay, mut tickets) = channel_relay();
        let read = ToolCall {
            id: "call-read".to_string(),
            name: "file.read".to_string(),
            arguments: serde_json::json!({"path":"X"}),
        };
        let f = fixture(
            vec![
                calls(vec![read, delete_call("X")]),
                text("should not be reached"),
            ],
            ConfirmationPolicy::default(),
            relay,
        )
        .await;
        let target = f.workspace.path().join("X");
        std::fs::write(&target, "keep").expect("seed file");
        let session = SessionId::from("s-cancel");

        let turn = spawn_turn(&f.runtime, &session, "delete file X");
        let mut ticket = tickets.recv().await.expect("ticket");
        assert_eq!(ticket.pending().tool_calls.len(), 2);
        assert!(ticket.cancel());

        let outcome = turn.await.expect("join").expect("turn");
        assert_eq!(outcome.status, TurnStatus::Cancelled);
        assert!(outcome.text.contains("not performed"));
        assert!(outcome.text.contains("Delete X"));
        assert!(outcome.text.contains("Read X"));
        assert!(target.exists());
        assert_eq!(f.llm.remaining(), 1, "model is not consulted after a cancel");

        let stored = f.runtime.memory().load_session(&session).await.expect("load");
        assert!(stored.iter().all(|m| m.role != Role::Tool));
        assert!(stored.iter().all(|m| m.tool_calls.is_none()));
        assert_eq!(stored.last().map(|m| m.content.as_str()), Some(outcome.text.as_str()));
    }

    #[tokio::test]
    async fn missing_handler_becomes_assistant_message() {
        let f = fixture(
            vec![calls(vec![delete_call("X")])],
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
        )
        .await;
        std::fs::write(f.workspace.path().join("X"), "keep").expect("seed file");
        let session = SessionId::from("s-nohandler");

        let outcome = f
            .runtime
            .process(&ChannelId::new("test", "main"), &session, "delete file X")
            .await
            .expect("relay errors are not propagated");
        assert_eq!(outcome.status, TurnStatus::ConfirmationFailed);
        assert!(
            outcome
                .text
                .starts_with("Could not request confirmation: No confirmation handler registered")
        );
        assert!(f.workspace.path().join("X").exists());
    }

    #[tokio::test]
    async fn non_sensitive_batch_skips_confirmation() {
        let f = fixture(
            vec![
                calls(vec![ToolCall {
                    id: "call-read".to_string(),
                    name: "file.read".to_string(),
                    arguments: serde_json::json!({"path":"notes.txt"}),
                }]),
                text("It says hello."),
            ],
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
        )
        .await;
        std::fs::write(f.workspace.path().join("notes.txt"), "hello").expect("seed");
        let session = SessionId::from("s-read");

        let outcome = f
            .runtime
            .process(&ChannelId::new("test", "main"), &session, "read notes")
            .await
            .expect("turn");
        assert_eq!(outcome.status, TurnStatus::Completed);
        let stored = f.runtime.memory().load_session(&session).await.expect("load");
        assert!(stored.iter().any(|m| m.role == Role::Tool && m.content == "hello"));
    }

    #[tokio::test]
    async fn structured_tool_errors_are_recorded() {
        let f = fixture(
            vec![calls(vec![delete_call("../etc/passwd")]), text("Could not.")],
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::with_handler(Arc::new(AutoConfirmHandler))),
        )
        .await;
        let session = SessionId::from("s-err");
        f.runtime
            .process(&ChannelId::new("test", "main"), &session, "delete it")
            .await
            .expect("turn");

        let stored = f.runtime.memory().load_session(&session).await.expect("load");
        let tool = stored
            .iter()
            .find(|m| m.role == Role::Tool)
            .expect("tool message");
        assert!(matches!(
            proto::tool::parse_failure(&tool.content),
            ToolFailure::Structured { ref code, .. } if code == "path_outside_workspace"
        ));
    }

    #[tokio::test]
    async fn never_mode_runs_without_asking() {
        let f = fixture(
            vec![calls(vec![delete_call("X")]), text("done")],
            ConfirmationPolicy::new(ConfirmationMode::Never),
            Arc::new(ConfirmationRelay::new()),
        )
        .await;
        std::fs::write(f.workspace.path().join("X"), "bye").expect("seed");
        let outcome = f
            .runtime
            .process(&ChannelId::new("test", "main"), &SessionId::from("s-never"), "go")
            .await
            .expect("turn");
        assert_eq!(outcome.status, TurnStatus::Completed);
        assert!(!f.workspace.path().join("X").exists());
    }

    #[tokio::test]
    async fn progress_reports_confirmation_lifecycle() {
        let (relay, mut tickets) = channel_relay();
        let f = fixture(
            vec![calls(vec![delete_call("X")]), text("ok")],
            ConfirmationPolicy::default(),
            relay,
        )
        .await;
        std::fs::write(f.workspace.path().join("X"), "bye").expect("seed");
        let (tx, mut rx) = mpsc::channel(32);

        let turn = {
            let runtime = Arc::clone(&f.runtime);
            tokio::spawn(async move {
                runtime
                    .process_with_progress(
                        &ChannelId::new("test", "main"),
                        &SessionId::from("s-progress"),
                        "delete file X",
                        tx,
                    )
                    .await
            })
        };
        tickets.recv().await.expect("ticket").confirm();
        turn.await.expect("join").expect("turn");

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        assert!(matches!(events[0], ProgressEvent::LlmThinking { round: 0 }));
        assert!(matches!(
            events[1],
            ProgressEvent::ConfirmationRequested { call_count: 1, .. }
        ));
        assert!(matches!(
            events[2],
            ProgressEvent::ConfirmationResolved { approved: true }
        ));
        assert!(matches!(events[3], ProgressEvent::ToolCallStarted { .. }));
        assert!(matches!(
            events[4],
            ProgressEvent::ToolCallFinished { is_error: false, .. }
        ));
        assert!(matches!(events[5], ProgressEvent::LlmThinking { round: 1 }));
    }

    #[tokio::test]
    async fn max_tool_rounds_is_enforced() {
        let read = || {
            calls(vec![ToolCall::new(
                "file.read",
                serde_json::json!({"path":"missing"}),
            )])
        };
        let f = fixture(
            vec![read(), read(), read(), read(), read()],
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
        )
        .await;
        let err = f
            .runtime
            .process(&ChannelId::new("test", "main"), &SessionId::from("s-max"), "loop")
            .await
            .expect_err("should stop");
        assert!(matches!(
            err,
            proto::Error::Llm(LlmError::MaxToolRoundsExceeded)
        ));
    }

    #[tokio::test]
    async fn reset_session_clears_history() {
        let f = fixture(
            vec![text("hi")],
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
        )
        .await;
        let session = SessionId::from("s-reset");
        f.runtime
            .process(&ChannelId::new("test", "main"), &session, "hello")
            .await
            .expect("turn");
        assert_eq!(f.runtime.reset_session(&session).await.expect("reset"), 2);
        assert!(f.runtime.memory().load_session(&session).await.expect("load").is_empty());
    }

    #[test]
    fn trim_session_history_starts_on_user_message() {
        let session = SessionId::from("s");
        let mut history = vec![AgentMessage::new(session.clone(), Role::User, "old")];
        for i in 0..MAX_CONTEXT_MESSAGES {
            let role = if i % 3 == 1 { Role::User } else { Role::Assistant };
            history.push(AgentMessage::new(session.clone(), role, format!("m{i}")));
        }
        let trimmed = trim_session_history(history);
        assert!(trimmed.len() <= MAX_CONTEXT_MESSAGES);
        assert_eq!(trimmed[0].role, Role::User);
    }

    #[test]
    fn history_conversion_skips_system_and_keeps_call_links() {
        let session = SessionId::from("s");
        let history = vec![
            AgentMessage::new(session.clone(), Role::System, "ignored"),
            AgentMessage::new(session.clone(), Role::User, "delete X"),
            AgentMessage::assistant_tool_calls(session.clone(), vec![delete_call("X")]),
            AgentMessage::tool_result(session, "call-delete", "file.delete", "Deleted X"),
        ];
        let messages = history_to_chat_messages("sys", &history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[2].tool_calls.is_some());
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("call-delete"));
    }

    #[test]
    fn truncate_tool_result_is_char_safe() {
        assert_eq!(truncate_tool_result("short", 10), "short");
        let truncated = truncate_tool_result("가나다라마", 2);
        assert!(truncated.starts_with("가나"));
        assert!(truncated.contains("3 chars omitted"));
    }
}
