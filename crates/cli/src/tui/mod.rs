//! Full-screen chat interface with inline confirmation of tool calls.

pub mod app;
pub mod chat;
pub mod event;
pub mod theme;

pub use event::run_tui;
