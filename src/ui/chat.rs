use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::{panel, results};
use crate::app::App;

pub fn render_chat(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Percentage(50),
            Constraint::Min(5),
        ])
        .split(area);

    f.render_widget(&app.question, chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[1]);

    render_answer(f, app, middle[0]);
    render_sql(f, app, middle[1]);
    results::render_results(f, app, chunks[2]);
}

/// Rows `text` occupies when wrapped to `width` columns.
fn wrapped_height(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .lines()
        .map(|line| line.chars().count().max(1).div_ceil(width))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn render_answer(f: &mut Frame, app: &App, area: Rect) {
    let title = if app.asked.is_empty() {
        "Answer".to_string()
    } else {
        format!("Answer: {}", app.asked)
    };

    if app.answer.is_empty() {
        let hint = if app.is_busy() {
            "Thinking..."
        } else {
            "Ask a question about the connected database.\n\nThe schema is read once per connection and sent with every question."
        };
        let empty = Paragraph::new(hint)
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: false })
            .block(panel(title));
        f.render_widget(empty, area);
        return;
    }

    // Keep the tail of a long answer in view while it streams.
    let inner_height = area.height.saturating_sub(2);
    let content_height = wrapped_height(&app.answer, area.width.saturating_sub(2));
    let scroll = content_height.saturating_sub(inner_height);

    let answer = Paragraph::new(app.answer.as_str())
        .style(Style::default().fg(Color::White))
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(panel(title));
    f.render_widget(answer, area);
}

fn render_sql(f: &mut Frame, app: &App, area: Rect) {
    let lines: Vec<Line> = if app.sql.is_empty() {
        vec![Line::from(Span::styled(
            "No SQL extracted yet.",
            Style::default().fg(Color::DarkGray),
        ))]
    } else {
        app.sql
            .lines()
            .map(|line| {
                Line::from(Span::styled(
                    line.to_string(),
                    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                ))
            })
            .collect()
    };

    let sql = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(panel("SQL (F5 to run)"));
    f.render_widget(sql, area);
}
