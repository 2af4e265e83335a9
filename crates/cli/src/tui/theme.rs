//! Centralized TUI colors built on ratatui's Tailwind CSS palette.

use ratatui::style::Color;
use ratatui::style::palette::tailwind;

/// Every visual token the chat screen uses.
pub struct Theme {
    // ── Base ──
    pub fg: Color,
    /// Muted foreground for hints and previews.
    pub fg_muted: Color,
    pub border: Color,
    /// Border of the input box while it accepts text.
    pub border_active: Color,
    pub title: Color,

    // ── Semantic ──
    pub success: Color,
    pub warning: Color,
    pub error: Color,

    // ── Chat roles ──
    pub user_label: Color,
    pub assistant_label: Color,
    pub tool_call: Color,
    pub tool_result: Color,

    // ── Confirmation card ──
    pub card_border: Color,
    pub card_summary: Color,
    /// Parameter JSON shown under an expanded call.
    pub card_params: Color,
    pub card_approve: Color,
    pub card_cancel: Color,

    // ── Status bar ──
    pub status_spinner: Color,
    pub status_hint: Color,
}

impl Theme {
    /// The default dark theme using Tailwind palette.
    pub const fn default_dark() -> Self {
        Self {
            fg: tailwind::SLATE.c100,
            fg_muted: tailwind::SLATE.c500,
            border: tailwind::SLATE.c700,
            border_active: tailwind::EMERALD.c500,
            title: tailwind::EMERALD.c400,

            success: tailwind::EMERALD.c500,
            warning: tailwind::AMBER.c500,
            error: tailwind::RED.c500,

            user_label: tailwind::CYAN.c400,
            assistant_label: tailwind::EMERALD.c400,
            tool_call: tailwind::AMBER.c400,
            tool_result: tailwind::SLATE.c400,

            card_border: tailwind::AMBER.c500,
            card_summary: tailwind::SLATE.c100,
            card_params: tailwind::SKY.c400,
            card_approve: tailwind::EMERALD.c400,
            card_cancel: tailwind::RED.c400,

            status_spinner: tailwind::AMBER.c400,
            status_hint: tailwind::SLATE.c500,
        }
    }
}

/// Global theme instance.
pub const THEME: Theme = Theme::default_dark();
