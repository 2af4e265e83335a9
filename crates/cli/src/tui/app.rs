//! TUI application state, input handling, and frame layout.

use agent::{ConfirmationTicket, TurnOutcome};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use proto::{ChannelId, PendingConfirmation, ProgressEvent, SessionId, ToolFailure};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use tracing::{debug, warn};

use super::chat;
use super::theme::THEME;

/// Spinner animation frames (Braille pattern).
const SPINNER: &[char] = &['⣾', '⣽', '⣻', '⢿', '⡿', '⣟', '⣯', '⣷'];
const ARGS_PREVIEW_CHARS: usize = 80;
/// Calls beyond this index have no digit shortcut; Tab selects them.
pub const DIGIT_SHORTCUTS: usize = 9;

/// A single rendered item in the conversation history panel.
#[derive(Debug, Clone)]
pub enum TuiMessage {
    User(String),
    Assistant(String),
    /// An in-progress or completed tool call.
    ToolCall {
        call_id: String,
        tool_name: String,
        args_preview: String,
        done: bool,
    },
    /// Output of a finished call, keyed by the originating call id.
    ToolResult {
        call_id: String,
        tool_name: String,
        output: String,
        /// Parsed error payload when the call failed.
        failure: Option<ToolFailure>,
    },
    Error(String),
}

/// High-level processing state.
#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    /// No turn running; input box is active.
    Idle,
    /// Waiting for the model (spinner shown).
    Thinking { round: usize },
    /// A batch is waiting for the user's decision.
    AwaitingConfirmation,
    /// A tool call is executing.
    ExecutingTool { tool_name: String },
}

/// What the event loop must do after a key press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Start a turn with this message.
    Submit(String),
    /// Drop the conversation and start over.
    Reset,
}

/// The confirmation card currently shown at the end of the transcript.
pub struct ActiveConfirmation {
    ticket: ConfirmationTicket,
    /// Per-call "view parameters" toggles, in call order.
    expanded: Vec<bool>,
    /// Call that Space toggles.
    selected: usize,
}

impl ActiveConfirmation {
    fn new(ticket: ConfirmationTicket) -> Self {
        let expanded = vec![false; ticket.pending().tool_calls.len()];
        Self {
            ticket,
            expanded,
            selected: 0,
        }
    }

    pub fn pending(&self) -> &PendingConfirmation {
        self.ticket.pending()
    }

    pub fn is_expanded(&self, index: usize) -> bool {
        self.expanded.get(index).copied().unwrap_or(false)
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    fn select_next(&mut self) {
        if !self.expanded.is_empty() {
            self.selected = (self.selected + 1) % self.expanded.len();
        }
    }

    fn select_prev(&mut self) {
        if !self.expanded.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.expanded.len() - 1);
        }
    }
}

/// Full state for the TUI session.
pub struct TuiApp {
    /// Ordered conversation history for display.
    pub messages: Vec<TuiMessage>,
    /// Current text typed in the input box (not yet submitted).
    pub input: String,
    /// Cursor position within `input` (byte offset).
    pub cursor_pos: usize,
    pub state: AppState,
    /// Vertical scroll offset for the history panel.
    pub history_scroll: u16,
    /// Model name shown in the title bar.
    pub model_name: String,
    pub session_id: SessionId,
    pub channel_id: ChannelId,
    /// Spinner animation tick counter.
    pub spinner_tick: u8,
    pub should_quit: bool,
    confirmation: Option<ActiveConfirmation>,
    round: usize,
}

impl TuiApp {
    pub fn new(model_name: impl Into<String>, session_id: SessionId, channel_id: ChannelId) -> Self {
        Self {
            messages: Vec::new(),
            input: String::new(),
            cursor_pos: 0,
            state: AppState::Idle,
            history_scroll: 0,
            model_name: model_name.into(),
            session_id,
            channel_id,
            spinner_tick: 0,
            should_quit: false,
            confirmation: None,
            round: 0,
        }
    }

    // ── State mutations ──────────────────────────────────────

    pub fn push_user(&mut self, text: String) {
        self.messages.push(TuiMessage::User(text));
    }

    pub fn push_assistant(&mut self, text: String) {
        self.messages.push(TuiMessage::Assistant(text));
    }

    pub fn push_error(&mut self, err: String) {
        self.messages.push(TuiMessage::Error(err));
    }

    /// Take the current input and reset it.
    pub fn take_input(&mut self) -> String {
        self.cursor_pos = 0;
        std::mem::take(&mut self.input)
    }

    /// Whether typed text and Enter reach the input box.
    pub fn input_enabled(&self) -> bool {
        self.state == AppState::Idle && self.confirmation.is_none()
    }

    pub fn confirmation(&self) -> Option<&ActiveConfirmation> {
        self.confirmation.as_ref()
    }

    /// Shows the card for a newly delivered ticket.
    pub fn show_confirmation(&mut self, ticket: ConfirmationTicket) {
        if let Some(mut stale) = self.confirmation.take() {
            warn!("Replacing an unresolved confirmation; cancelling it");
            stale.ticket.cancel();
        }
        debug!(
            summary = %ticket.pending().summary,
            calls = ticket.pending().tool_calls.len(),
            "Confirmation card shown"
        );
        self.confirmation = Some(ActiveConfirmation::new(ticket));
        self.state = AppState::AwaitingConfirmation;
    }

    /// Approves the pending batch. Returns `false` when nothing was pending.
    pub fn confirm_pending(&mut self) -> bool {
        self.resolve_pending(true)
    }

    /// Cancels the pending batch. Returns `false` when nothing was pending.
    pub fn cancel_pending(&mut self) -> bool {
        self.resolve_pending(false)
    }

    fn resolve_pending(&mut self, approved: bool) -> bool {
        let Some(mut active) = self.confirmation.take() else {
            return false;
        };
        let resolved = if approved {
            active.ticket.confirm()
        } else {
            active.ticket.cancel()
        };
        self.state = AppState::Thinking { round: self.round };
        resolved
    }

    /// Flips the "view parameters" toggle of the call at `index`.
    pub fn toggle_params(&mut self, index: usize) {
        if let Some(flag) = self
            .confirmation
            .as_mut()
            .and_then(|c| c.expanded.get_mut(index))
        {
            *flag = !*flag;
        }
    }

    /// Cancels any pending confirmation, clears the transcript, and switches
    /// to a fresh session. Returns the session that was left.
    pub fn reset_conversation(&mut self) -> SessionId {
        self.cancel_pending();
        self.messages.clear();
        self.take_input();
        self.state = AppState::Idle;
        self.history_scroll = 0;
        self.round = 0;
        std::mem::replace(&mut self.session_id, SessionId::new())
    }

    /// Apply a progress event from the agent runtime.
    pub fn apply_progress(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::LlmThinking { round } => {
                self.round = round;
                self.state = AppState::Thinking { round };
            }
            // The card itself is driven by the delivered ticket.
            ProgressEvent::ConfirmationRequested { summary, call_count } => {
                debug!(%summary, call_count, "Turn paused for confirmation");
            }
            ProgressEvent::ConfirmationResolved { approved } => {
                debug!(approved, "Turn resumed");
            }
            ProgressEvent::ToolCallStarted {
                call_id,
                tool_name,
                args,
            } => {
                self.state = AppState::ExecutingTool {
                    tool_name: tool_name.clone(),
                };
                self.messages.push(TuiMessage::ToolCall {
                    call_id,
                    tool_name,
                    args_preview: preview(&args.to_string(), ARGS_PREVIEW_CHARS),
                    done: false,
                });
            }
            ProgressEvent::ToolCallFinished {
                call_id,
                tool_name,
                output,
                is_error,
            } => {
                for msg in self.messages.iter_mut().rev() {
                    if let TuiMessage::ToolCall {
                        call_id: id, done, ..
                    } = msg
                        && *id == call_id
                    {
                        *done = true;
                        break;
                    }
                }
                let failure = is_error.then(|| proto::tool::parse_failure(&output));
                let at = self.result_slot(&call_id);
                self.messages.insert(
                    at,
                    TuiMessage::ToolResult {
                        call_id,
                        tool_name,
                        output,
                        failure,
                    },
                );
            }
        }
    }

    /// Index just below the matching call and any results already under it,
    /// or the end of the transcript when the call is not shown.
    fn result_slot(&self, call_id: &str) -> usize {
        let Some(call_at) = self.messages.iter().rposition(
            |m| matches!(m, TuiMessage::ToolCall { call_id: id, .. } if id == call_id),
        ) else {
            return self.messages.len();
        };
        let below = self.messages[call_at + 1..]
            .iter()
            .take_while(
                |m| matches!(m, TuiMessage::ToolResult { call_id: id, .. } if id == call_id),
            )
            .count();
        call_at + 1 + below
    }

    /// Apply the final result from the agent runtime.
    pub fn apply_completion(&mut self, result: Result<TurnOutcome, proto::Error>) {
        match result {
            Ok(outcome) if outcome.status.is_error() => self.push_error(outcome.text),
            Ok(outcome) => self.push_assistant(outcome.text),
            Err(e) => self.push_error(e.to_string()),
        }
        if let Some(mut stale) = self.confirmation.take() {
            stale.ticket.cancel();
        }
        self.state = AppState::Idle;
    }

    // ── Input handling ───────────────────────────────────────

    /// Handle a keyboard event.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<AppAction> {
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => {
                self.should_quit = true;
                None
            }
            (KeyModifiers::CONTROL, KeyCode::Char('l')) => Some(AppAction::Reset),
            (_, KeyCode::Up) => {
                self.history_scroll = self.history_scroll.saturating_sub(1);
                None
            }
            (_, KeyCode::Down) => {
                self.history_scroll = self.history_scroll.saturating_add(1);
                None
            }
            (_, KeyCode::PageUp) => {
                self.history_scroll = self.history_scroll.saturating_sub(10);
                None
            }
            (_, KeyCode::PageDown) => {
                self.history_scroll = self.history_scroll.saturating_add(10);
                None
            }
            _ if self.confirmation.is_some() => {
                self.handle_confirmation_key(key.code);
                None
            }
            _ if self.input_enabled() => self.handle_input_key(key.code),
            _ => None,
        }
    }

    fn handle_confirmation_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('y') | KeyCode::Char('Y') => {
                self.confirm_pending();
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.cancel_pending();
            }
            KeyCode::Char(c) if c.is_ascii_digit() && c != '0' => {
                self.toggle_params(c as usize - '1' as usize);
            }
            KeyCode::Tab => {
                if let Some(card) = self.confirmation.as_mut() {
                    card.select_next();
                }
            }
            KeyCode::BackTab => {
                if let Some(card) = self.confirmation.as_mut() {
                    card.select_prev();
                }
            }
            KeyCode::Char(' ') => {
                if let Some(index) = self.confirmation.as_ref().map(|c| c.selected) {
                    self.toggle_params(index);
                }
            }
            _ => {}
        }
    }

    fn handle_input_key(&mut self, code: KeyCode) -> Option<AppAction> {
        match code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Enter => {
                if self.input.trim().is_empty() {
                    return None;
                }
                let message = self.take_input();
                return match message.trim() {
                    "/clear" => Some(AppAction::Reset),
                    "/quit" | "/exit" => {
                        self.should_quit = true;
                        None
                    }
                    _ => Some(AppAction::Submit(message)),
                };
            }
            KeyCode::Char(c) => {
                self.input.insert(self.cursor_pos, c);
                self.cursor_pos += c.len_utf8();
            }
            KeyCode::Backspace if self.cursor_pos > 0 => {
                let prev = self.prev_boundary();
                self.input.drain(prev..self.cursor_pos);
                self.cursor_pos = prev;
            }
            KeyCode::Left => self.cursor_pos = self.prev_boundary(),
            KeyCode::Right => {
                self.cursor_pos = self.input[self.cursor_pos..]
                    .chars()
                    .next()
                    .map(|c| self.cursor_pos + c.len_utf8())
                    .unwrap_or(self.input.len());
            }
            _ => {}
        }
        None
    }

    fn prev_boundary(&self) -> usize {
        self.input[..self.cursor_pos]
            .char_indices()
            .last()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    // ── Rendering ────────────────────────────────────────────

    /// Render the entire TUI into the given frame.
    pub fn render(&self, frame: &mut Frame<'_>) {
        // Layout: title(1) | history(fill) | status(1) | input(3)
        let chunks = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

        self.render_title(frame, chunks[0]);
        chat::render(self, frame, chunks[1]);
        self.render_status(frame, chunks[2]);
        self.render_input(frame, chunks[3]);
    }

    fn render_title(&self, frame: &mut Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                " toolgate ",
                Style::default()
                    .fg(THEME.title)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" session:{} ", self.session_id.short()),
                Style::default().fg(THEME.fg_muted),
            ),
            Span::styled(
                format!(" {} ", self.model_name),
                Style::default().fg(THEME.success),
            ),
        ]);
        frame.render_widget(Paragraph::new(title), area);
    }

    fn render_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let spinner = SPINNER[(self.spinner_tick as usize) % SPINNER.len()];
        let hint = |text: &'static str| Span::styled(text, Style::default().fg(THEME.status_hint));
        let line = match &self.state {
            AppState::Idle => Line::from(hint(
                " Enter:send  ↑↓:scroll  Ctrl+L:/clear  Ctrl+C:quit",
            )),
            AppState::Thinking { round } => Line::from(vec![
                Span::styled(
                    format!(" {spinner} Thinking... "),
                    Style::default().fg(THEME.status_spinner),
                ),
                Span::styled(format!("[round {round}]"), Style::default().fg(THEME.fg_muted)),
            ]),
            AppState::AwaitingConfirmation => Line::from(vec![
                Span::styled(
                    " Waiting for your decision ",
                    Style::default().fg(THEME.warning),
                ),
                hint(" y:proceed  n/Esc:cancel  1-9 or Tab+Space:view parameters"),
            ]),
            AppState::ExecutingTool { tool_name } => Line::from(vec![
                Span::styled(
                    format!(" {spinner} Running "),
                    Style::default().fg(THEME.status_spinner),
                ),
                Span::styled(tool_name.as_str(), Style::default().fg(THEME.tool_call)),
            ]),
        };
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_input(&self, frame: &mut Frame<'_>, area: Rect) {
        let enabled = self.input_enabled();
        let (text, style) = match (enabled, self.input.is_empty()) {
            (true, true) => ("Type a message...", Style::default().fg(THEME.fg_muted)),
            (false, _) if self.confirmation.is_some() => (
                "Answer the confirmation above first",
                Style::default().fg(THEME.fg_muted),
            ),
            _ => (self.input.as_str(), Style::default().fg(THEME.fg)),
        };
        let border = if enabled {
            THEME.border_active
        } else {
            THEME.border
        };

        let input = Paragraph::new(Span::styled(text, style)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(" Input "),
        );
        frame.render_widget(input, area);

        if enabled {
            let cursor_col = self.input[..self.cursor_pos].chars().count() as u16;
            frame.set_cursor_position((area.x + 1 + cursor_col, area.y + 1));
        }
    }

    /// Ensure scroll is at the bottom (for auto-scroll on new messages).
    pub fn scroll_to_bottom(&mut self) {
        // Clamped to the real maximum while rendering.
        self.history_scroll = u16::MAX;
    }
}

/// Shortens `text` to `max_chars` characters, marking the cut with an ellipsis.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars).collect();
    format!("{kept}…")
}
