//! Chat history widget: transcript, tool results, and the inline confirmation card.

use proto::ToolFailure;
use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use super::app::{ActiveConfirmation, DIGIT_SHORTCUTS, TuiApp, TuiMessage, preview};
use super::theme::THEME;

const RESULT_PREVIEW_CHARS: usize = 120;

/// Renders the chat history area, with the pending confirmation card (if any)
/// as the last entry.
pub fn render(app: &TuiApp, frame: &mut Frame<'_>, area: Rect) {
    let lines = history_lines(app);

    let visible_height = area.height.saturating_sub(2);
    let max_scroll = (lines.len() as u16).saturating_sub(visible_height);
    let scroll = app.history_scroll.min(max_scroll);

    let history = Paragraph::new(Text::from(lines))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(THEME.border)),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    frame.render_widget(history, area);
}

/// Builds every transcript line in display order.
pub fn history_lines(app: &TuiApp) -> Vec<Line<'_>> {
    let mut lines: Vec<Line<'_>> = Vec::new();

    for msg in &app.messages {
        match msg {
            TuiMessage::User(text) => {
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled(
                        "You: ",
                        Style::default()
                            .fg(THEME.user_label)
                            .add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(text.as_str()),
                ]));
            }
            TuiMessage::Assistant(text) => {
                lines.push(Line::from(""));
                for (i, line) in text.lines().enumerate() {
                    if i == 0 {
                        lines.push(Line::from(vec![
                            Span::styled(
                                "Agent: ",
                                Style::default()
                                    .fg(THEME.assistant_label)
                                    .add_modifier(Modifier::BOLD),
                            ),
                            Span::raw(line),
                        ]));
                    } else {
                        lines.push(Line::from(Span::raw(format!("       {line}"))));
                    }
                }
            }
            TuiMessage::ToolCall {
                tool_name,
                args_preview,
                done,
                ..
            } => {
                let status = if *done { "✓" } else { "⟳" };
                lines.push(Line::from(vec![
                    Span::styled(
                        format!("  [{status} {tool_name}] "),
                        Style::default().fg(THEME.tool_call),
                    ),
                    Span::styled(args_preview.as_str(), Style::default().fg(THEME.fg_muted)),
                ]));
            }
            TuiMessage::ToolResult {
                tool_name,
                output,
                failure,
                ..
            } => lines.push(tool_result_line(tool_name, output, failure.as_ref())),
            TuiMessage::Error(text) => {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(
                    format!("Error: {text}"),
                    Style::default()
                        .fg(THEME.error)
                        .add_modifier(Modifier::BOLD),
                )));
            }
        }
    }

    if let Some(card) = app.confirmation() {
        lines.extend(card_lines(card));
    }
    lines
}

/// One-line rendering of a tool result: output preview on success, the
/// message for a plain error, `[code] message` for a structured one.
pub fn tool_result_line<'a>(
    tool_name: &str,
    output: &str,
    failure: Option<&ToolFailure>,
) -> Line<'a> {
    match failure {
        None => Line::from(Span::styled(
            format!(
                "    [{tool_name}] → {}",
                preview(&output.replace('\n', " "), RESULT_PREVIEW_CHARS)
            ),
            Style::default().fg(THEME.tool_result),
        )),
        Some(ToolFailure::Structured { code, message }) => Line::from(vec![
            Span::styled(
                format!("    [{tool_name}] ✗ "),
                Style::default().fg(THEME.error),
            ),
            Span::styled(
                format!("[{code}] "),
                Style::default()
                    .fg(THEME.error)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(message.clone(), Style::default().fg(THEME.error)),
        ]),
        Some(ToolFailure::Message(message)) => Line::from(Span::styled(
            format!(
                "    [{tool_name}] ✗ {}",
                preview(message, RESULT_PREVIEW_CHARS)
            ),
            Style::default().fg(THEME.error),
        )),
    }
}

/// Lines of the confirmation card: summary, numbered calls with optional
/// parameter JSON, and the two actions.
pub fn card_lines(card: &ActiveConfirmation) -> Vec<Line<'static>> {
    let border = Style::default().fg(THEME.card_border);
    let bar = || Span::styled("  │ ", border);
    let pending = card.pending();

    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  ┌ Confirm actions",
            border.add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            bar(),
            Span::styled(
                pending.summary.clone(),
                Style::default()
                    .fg(THEME.card_summary)
                    .add_modifier(Modifier::BOLD),
            ),
        ]),
    ];

    for (i, call) in pending.tool_calls.iter().enumerate() {
        let expanded = card.is_expanded(i);
        let toggle = if expanded {
            "hide parameters"
        } else {
            "view parameters"
        };
        let shortcut = if i < DIGIT_SHORTCUTS {
            format!("[{}] {toggle}", i + 1)
        } else {
            format!("[Tab, Space] {toggle}")
        };
        let marker = if card.selected() == i { "› " } else { "  " };
        lines.push(Line::from(vec![
            bar(),
            Span::styled(marker, Style::default().fg(THEME.card_summary)),
            Span::raw(format!("{}. {}  ", i + 1, call.description)),
            Span::styled(shortcut, Style::default().fg(THEME.fg_muted)),
        ]));
        if expanded {
            let json = serde_json::to_string_pretty(&call.tool_args)
                .unwrap_or_else(|_| call.tool_args.to_string());
            for json_line in json.lines() {
                lines.push(Line::from(vec![
                    bar(),
                    Span::styled(
                        format!("     {json_line}"),
                        Style::default().fg(THEME.card_params),
                    ),
                ]));
            }
        }
    }

    lines.push(Line::from(vec![
        Span::styled("  └ ", border),
        Span::styled(
            "[y] Yes, proceed",
            Style::default()
                .fg(THEME.card_approve)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        Span::styled(
            "[n] Cancel",
            Style::default()
                .fg(THEME.card_cancel)
                .add_modifier(Modifier::BOLD),
        ),
    ]));
    lines
}

#[cfg(test)]
mod tests {
    use agent::ConfirmationTicket;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use proto::{ChannelId, PendingConfirmation, PendingToolCall, ProgressEvent, SessionId};

    use super::*;

    fn text_of(lines: &[Line<'_>]) -> Vec<String> {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn app_with_card() -> (TuiApp, tokio::sync::oneshot::Receiver<bool>) {
        let mut app = TuiApp::new("gpt-4o", SessionId::new(), ChannelId::from("cli:tui"));
        app.push_user("delete file X".to_string());
        let (ticket, rx) = ConfirmationTicket::new(PendingConfirmation::new(
            "About to delete 1 file",
            vec![PendingToolCall {
                id: "call-1".to_string(),
                tool_name: "file.delete".to_string(),
                description: "Delete X".to_string(),
                tool_args: serde_json::json!({"path":"X"}),
            }],
        ));
        app.show_confirmation(ticket);
        (app, rx)
    }

    #[test]
    fn card_is_rendered_inline_after_transcript() {
        let (app, _rx) = app_with_card();
        let text = text_of(&history_lines(&app));

        let user = text.iter().position(|l| l.contains("delete file X")).expect("user");
        let summary = text
            .iter()
            .position(|l| l.contains("About to delete 1 file"))
            .expect("summary");
        assert!(summary > user);
        assert!(text.iter().any(|l| l.contains("1. Delete X") && l.contains("view parameters")));
        let actions = text.last().expect("actions");
        assert!(actions.contains("[y] Yes, proceed"));
        assert!(actions.contains("[n] Cancel"));
        assert!(!text.iter().any(|l| l.contains("\"path\"")));
    }

    #[test]
    fn expanded_call_shows_parameters() {
        let (mut app, _rx) = app_with_card();
        app.handle_key(KeyEvent::new(KeyCode::Char('1'), KeyModifiers::NONE));
        let text = text_of(&history_lines(&app));
        assert!(text.iter().any(|l| l.contains(r#""path": "X""#)));
        assert!(text.iter().any(|l| l.contains("hide parameters")));
    }

    #[test]
    fn card_disappears_once_answered() {
        let (mut app, _rx) = app_with_card();
        app.confirm_pending();
        let text = text_of(&history_lines(&app));
        assert!(!text.iter().any(|l| l.contains("Confirm actions")));
    }

    #[test]
    fn calls_past_the_ninth_advertise_tab_selection() {
        let mut app = TuiApp::new("gpt-4o", SessionId::new(), ChannelId::from("cli:tui"));
        let (ticket, _rx) = ConfirmationTicket::new(PendingConfirmation::new(
            "About to delete 10 files",
            (0..10)
                .map(|i| PendingToolCall {
                    id: format!("call-{i}"),
                    tool_name: "file.delete".to_string(),
                    description: format!("Delete f{i}"),
                    tool_args: serde_json::json!({ "path": format!("f{i}") }),
                })
                .collect(),
        ));
        app.show_confirmation(ticket);

        let text = text_of(&history_lines(&app));
        assert!(text.iter().any(|l| l.contains("› 1. Delete f0") && l.contains("[1] view parameters")));
        assert!(text.iter().any(|l| l.contains("10. Delete f9") && l.contains("[Tab, Space] view parameters")));
        assert!(!text.iter().any(|l| l.contains("[10]")));
    }

    #[test]
    fn tool_results_use_structured_renderer() {
        let mut app = TuiApp::new("gpt-4o", SessionId::new(), ChannelId::from("cli:tui"));
        app.apply_progress(ProgressEvent::ToolCallFinished {
            call_id: "call-1".into(),
            tool_name: "file.delete".into(),
            output: "Deleted X".into(),
            is_error: false,
        });
        app.apply_progress(ProgressEvent::ToolCallFinished {
            call_id: "call-2".into(),
            tool_name: "email.send".into(),
            output: r#"{"code":"invalid_recipient","message":"'bob' is not an email address"}"#
                .into(),
            is_error: true,
        });
        app.apply_progress(ProgressEvent::ToolCallFinished {
            call_id: "call-3".into(),
            tool_name: "file.read".into(),
            output: "Read failed: permission denied".into(),
            is_error: true,
        });

        let text = text_of(&history_lines(&app));
        assert_eq!(text[0], "    [file.delete] → Deleted X");
        assert_eq!(
            text[1],
            "    [email.send] ✗ [invalid_recipient] 'bob' is not an email address"
        );
        assert_eq!(text[2], "    [file.read] ✗ Read failed: permission denied");
    }
}
