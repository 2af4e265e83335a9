//! Async event loop for the TUI: interleaves terminal input, turn progress,
//! confirmation tickets, and timer ticks.

use std::sync::Arc;

use agent::{AgentRuntime, ChannelConfirmationHandler, ConfirmationTicket, TurnOutcome};
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures_util::StreamExt;
use proto::{ChannelId, ProgressEvent, SessionId};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use super::app::{AppAction, AppState, TuiApp};

type TurnHandle = JoinHandle<Result<TurnOutcome, proto::Error>>;

/// RAII guard that restores the terminal on drop (even on panic).
struct TerminalGuard;

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(std::io::stdout(), LeaveAlternateScreen);
    }
}

/// Installs the TUI as the relay's confirmation handler; uninstalls on drop.
struct HandlerRegistration<'a> {
    runtime: &'a AgentRuntime,
}

impl<'a> HandlerRegistration<'a> {
    fn install(runtime: &'a AgentRuntime) -> (Self, mpsc::Receiver<ConfirmationTicket>) {
        let (handler, tickets) = ChannelConfirmationHandler::new();
        runtime.relay().register_handler(Some(Arc::new(handler)));
        (Self { runtime }, tickets)
    }
}

impl Drop for HandlerRegistration<'_> {
    fn drop(&mut self) {
        self.runtime.relay().register_handler(None);
    }
}

/// Run the full-screen TUI until the user quits.
pub async fn run_tui(
    runtime: Arc<AgentRuntime>,
    channel_id: ChannelId,
    session_id: SessionId,
) -> anyhow::Result<SessionId> {
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let _guard = TerminalGuard;

    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    let (_registration, mut tickets) = HandlerRegistration::install(&runtime);

    debug!(session = %session_id, model = %runtime.model(), "TUI started");
    let mut app = TuiApp::new(runtime.model(), session_id, channel_id);

    let mut crossterm_stream = EventStream::new();
    let mut turn: Option<TurnHandle> = None;
    let mut progress_rx: Option<mpsc::Receiver<ProgressEvent>> = None;

    let mut spinner_interval = tokio::time::interval(std::time::Duration::from_millis(100));
    spinner_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        terminal.draw(|frame| app.render(frame))?;

        tokio::select! {
            maybe_event = crossterm_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match app.handle_key(key) {
                            Some(AppAction::Submit(message)) => {
                                debug!(message_len = message.len(), "Turn spawned");
                                app.push_user(message.clone());
                                app.state = AppState::Thinking { round: 0 };
                                let (tx, rx) = mpsc::channel(64);
                                turn = Some(spawn_turn(&runtime, &app, message, tx));
                                progress_rx = Some(rx);
                            }
                            Some(AppAction::Reset) => {
                                let previous = app.reset_conversation();
                                stop_turn(&mut turn).await;
                                progress_rx = None;
                                if let Err(e) = runtime.reset_session(&previous).await {
                                    warn!(error = %e, "Failed to clear previous session");
                                }
                                debug!(from = %previous, to = %app.session_id, "Conversation reset");
                            }
                            None => {}
                        }
                        app.scroll_to_bottom();
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, "Terminal event stream error");
                        app.should_quit = true;
                    }
                    None => app.should_quit = true,
                }
            }

            Some(evt) = async {
                match progress_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                app.apply_progress(evt);
                app.scroll_to_bottom();
            }

            Some(ticket) = tickets.recv() => {
                if turn.is_some() {
                    app.show_confirmation(ticket);
                } else {
                    // A ticket with no turn on screen belongs to a reset conversation.
                    drop(ticket);
                }
                app.scroll_to_bottom();
            }

            result = async {
                match turn.as_mut() {
                    Some(handle) => handle.await,
                    None => std::future::pending().await,
                }
            } => {
                match result {
                    Ok(inner) => {
                        debug!(success = inner.is_ok(), "Turn completed");
                        app.apply_completion(inner);
                    }
                    Err(join_err) => app.apply_completion(Err(proto::Error::Llm(
                        proto::LlmError::InvalidResponse(format!("Task panicked: {join_err}"))
                    ))),
                }
                // Drain events that raced the completion.
                if let Some(rx) = progress_rx.as_mut() {
                    while let Ok(evt) = rx.try_recv() {
                        debug!(?evt, "Late progress event");
                    }
                }
                app.scroll_to_bottom();
                turn = None;
                progress_rx = None;
            }

            _ = spinner_interval.tick(), if app.state != AppState::Idle => {
                app.spinner_tick = app.spinner_tick.wrapping_add(1);
            }
        }

        if app.should_quit {
            break;
        }
    }

    // Unanswered tickets are dropped with `app`, which cancels them.
    stop_turn(&mut turn).await;
    Ok(app.session_id.clone())
}

fn spawn_turn(
    runtime: &Arc<AgentRuntime>,
    app: &TuiApp,
    message: String,
    progress_tx: mpsc::Sender<ProgressEvent>,
) -> TurnHandle {
    let rt = Arc::clone(runtime);
    let channel = app.channel_id.clone();
    let session = app.session_id.clone();
    tokio::spawn(async move {
        rt.process_with_progress(&channel, &session, &message, progress_tx)
            .await
    })
}

/// Aborts the running turn, if any, and waits for it to unwind.
async fn stop_turn(turn: &mut Option<TurnHandle>) {
    if let Some(handle) = turn.take() {
        handle.abort();
        if let Err(e) = handle.await
            && !e.is_cancelled()
        {
            warn!(error = %e, "Turn failed while stopping");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Arc, sync::Mutex};

    use agent::{
        ChatRequest, ChatResponse, ConfirmationPolicy, ConfirmationRelay, LlmProvider,
        SqliteMemory, TokenUsage, ToolRegistry,
    };
    use async_trait::async_trait;
    use proto::{LlmError, PendingConfirmation, RelayError, Role, ToolCall};
    use ratatui::text::Line;
    use tools::{FileDeleteTool, Workspace};

    use super::*;
    use crate::tui::app::TuiMessage;
    use crate::tui::chat::{history_lines, tool_result_line};

    struct SilentLlm;

    #[async_trait]
    impl LlmProvider for SilentLlm {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
            Err(LlmError::InvalidResponse("unused".to_string()))
        }
    }

    /// Replays canned responses in order.
    struct ScriptedLlm {
        queue: Mutex<VecDeque<ChatResponse>>,
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
            self.queue
                .lock()
                .expect("lock queue")
                .pop_front()
                .ok_or_else(|| LlmError::InvalidResponse("No scripted response left".to_string()))
        }
    }

    /// Runtime whose model asks to delete `X`, then replies "Deleted X".
    async fn delete_runtime(dir: &tempfile::TempDir) -> Arc<AgentRuntime> {
        let workspace = dir.path().join("ws");
        std::fs::create_dir_all(&workspace).expect("workspace");
        std::fs::write(workspace.join("X"), "bye").expect("write");

        let mut registry = ToolRegistry::new();
        registry.register(FileDeleteTool::new(Workspace::new(&workspace)));
        let llm = ScriptedLlm {
            queue: Mutex::new(VecDeque::from(vec![
                ChatResponse::ToolCalls(
                    vec![ToolCall {
                        id: "call-delete".to_string(),
                        name: "file.delete".to_string(),
                        arguments: serde_json::json!({"path":"X"}),
                    }],
                    TokenUsage::default(),
                ),
                ChatResponse::Text("Deleted X".to_string(), TokenUsage::default()),
            ])),
        };
        let memory = SqliteMemory::open(&dir.path().join("m.db").to_string_lossy())
            .await
            .expect("memory");
        Arc::new(AgentRuntime::new(
            Arc::new(llm),
            Arc::new(registry),
            Arc::new(memory),
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
            "test-model",
            4,
        ))
    }

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    /// Drives one "delete file X" turn through the mounted handler, answering
    /// the card with `approve`, and feeds everything back into the app.
    async fn run_delete_turn(runtime: &Arc<AgentRuntime>, approve: bool) -> TuiApp {
        let (_registration, mut tickets) = HandlerRegistration::install(runtime);
        let mut app = TuiApp::new(
            runtime.model(),
            SessionId::from("s-tui"),
            ChannelId::new("cli", "tui"),
        );

        app.push_user("delete file X".to_string());
        let (tx, mut progress) = mpsc::channel(64);
        let turn = spawn_turn(runtime, &app, "delete file X".to_string(), tx);

        let ticket = tickets.recv().await.expect("ticket");
        app.show_confirmation(ticket);
        assert_eq!(app.state, AppState::AwaitingConfirmation);
        assert!(
            text_of(&history_lines(&app))
                .iter()
                .any(|l| l.contains("1. Delete X"))
        );
        if approve {
            assert!(app.confirm_pending());
        } else {
            assert!(app.cancel_pending());
        }

        let result = turn.await.expect("join");
        while let Some(evt) = progress.recv().await {
            app.apply_progress(evt);
        }
        app.apply_completion(result);
        app
    }

    #[tokio::test]
    async fn approved_delete_renders_result_under_its_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = delete_runtime(&dir).await;

        let app = run_delete_turn(&runtime, true).await;
        assert!(!dir.path().join("ws").join("X").exists());

        let call_at = app
            .messages
            .iter()
            .position(|m| matches!(m, TuiMessage::ToolCall { call_id, done: true, .. } if call_id == "call-delete"))
            .expect("tool call shown");
        let (output, failure) = match &app.messages[call_at + 1] {
            TuiMessage::ToolResult {
                call_id,
                output,
                failure,
                ..
            } => {
                assert_eq!(call_id, "call-delete");
                (output.clone(), failure.clone())
            }
            other => panic!("unexpected message: {other:?}"),
        };
        assert_eq!(output, "Deleted X");
        assert!(failure.is_none());

        let expected = text_of(&[tool_result_line("file.delete", &output, None)]).remove(0);
        let rendered = text_of(&history_lines(&app));
        assert!(rendered.contains(&expected), "missing {expected:?} in {rendered:?}");
        assert!(matches!(app.messages.last(), Some(TuiMessage::Assistant(t)) if t == "Deleted X"));
        assert_eq!(app.state, AppState::Idle);
        assert!(app.confirmation().is_none());
    }

    #[tokio::test]
    async fn cancelled_delete_runs_nothing_and_says_so() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = delete_runtime(&dir).await;

        let app = run_delete_turn(&runtime, false).await;
        assert!(dir.path().join("ws").join("X").exists());
        assert!(
            !app.messages
                .iter()
                .any(|m| matches!(m, TuiMessage::ToolCall { .. } | TuiMessage::ToolResult { .. }))
        );
        match app.messages.last() {
            Some(TuiMessage::Assistant(text)) => {
                assert!(text.contains("not performed"));
                assert!(text.contains("Delete X"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
        let stored = runtime
            .memory()
            .load_session(&SessionId::from("s-tui"))
            .await
            .expect("load");
        assert!(stored.iter().all(|m| m.role != Role::Tool));
    }

    async fn runtime(dir: &tempfile::TempDir) -> Arc<AgentRuntime> {
        let memory = SqliteMemory::open(&dir.path().join("m.db").to_string_lossy())
            .await
            .expect("memory");
        Arc::new(AgentRuntime::new(
            Arc::new(SilentLlm),
            Arc::new(ToolRegistry::new()),
            Arc::new(memory),
            ConfirmationPolicy::default(),
            Arc::new(ConfirmationRelay::new()),
            "test-model",
            2,
        ))
    }

    #[test]
    fn terminal_guard_drop_path_is_safe() {
        let guard = TerminalGuard;
        drop(guard);
    }

    #[tokio::test]
    async fn handler_is_registered_only_while_mounted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let runtime = runtime(&dir).await;
        {
            let (_registration, mut tickets) = HandlerRegistration::install(&runtime);
            assert!(runtime.relay().has_handler());

            let relay = Arc::clone(runtime.relay());
            let request = tokio::spawn(async move {
                relay
                    .request_confirmation(PendingConfirmation::new("About to delete 1 file", vec![]))
                    .await
            });
            let ticket = tickets.recv().await.expect("ticket");
            drop(ticket);
            assert_eq!(request.await.expect("join"), Ok(false));
        }
        assert!(!runtime.relay().has_handler());
        assert_eq!(
            runtime
                .relay()
                .request_confirmation(PendingConfirmation::new("About to delete 1 file", vec![]))
                .await,
            Err(RelayError::NoConfirmationHandler)
        );
    }

    #[tokio::test]
    async fn stop_turn_aborts_and_clears() {
        let mut turn: Option<TurnHandle> = Some(tokio::spawn(async {
            std::future::pending::<Result<TurnOutcome, proto::Error>>().await
        }));
        stop_turn(&mut turn).await;
        assert!(turn.is_none());
    }
}
