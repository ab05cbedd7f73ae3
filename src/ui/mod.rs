use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, AppMode};

mod chat;
mod connection;
mod results;

pub fn render(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    // Main content area
    match app.mode {
        AppMode::ConnectionSelector => connection::render_selector(f, app, chunks[0]),
        AppMode::ConnectionEdit => connection::render_editor(f, app, chunks[0]),
        AppMode::Chat => chat::render_chat(f, app, chunks[0]),
    }

    // Status bar
    render_status_bar(f, app, chunks[1]);
}

/// Bordered block with a cyan frame, used by every pane.
pub(crate) fn panel(title: impl Into<String>) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .title(title.into())
        .border_style(Style::default().fg(Color::Cyan))
}

fn key_hints(app: &App) -> &'static str {
    match app.mode {
        AppMode::ConnectionSelector if app.config.connections.is_empty() => "n:new connection | q:quit",
        AppMode::ConnectionSelector => "↑↓:navigate | Enter:select | n:new | d:delete | q:quit",
        AppMode::ConnectionEdit => "Tab:next field | Enter:connect | Esc:back",
        AppMode::Chat if app.is_busy() => "streaming answer... | Esc:cancel",
        AppMode::Chat => "Enter:ask | F5:run SQL | Ctrl+R:reload schema | Esc:disconnect | Ctrl+Q:quit",
    }
}

fn render_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let mode_text = match app.mode {
        AppMode::ConnectionSelector => "CONNECTIONS",
        AppMode::ConnectionEdit => "EDIT CONNECTION",
        AppMode::Chat => "ASK",
    };

    let (status_text, status_style) = if let Some(err) = &app.error_message {
        (
            format!(" {} | ERROR: {} ", mode_text, err),
            Style::default().fg(Color::Red).bg(Color::Black),
        )
    } else if let Some(status) = &app.status_message {
        (
            format!(" {} | {} | {} ", mode_text, status, key_hints(app)),
            Style::default().fg(Color::Green).bg(Color::Black),
        )
    } else {
        (
            format!(" {} | {} ", mode_text, key_hints(app)),
            Style::default().fg(Color::Cyan).bg(Color::Black),
        )
    };

    let status = Paragraph::new(status_text)
        .style(status_style)
        .block(Block::default().borders(Borders::ALL));

    f.render_widget(status, area);
}
