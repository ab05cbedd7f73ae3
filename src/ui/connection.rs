use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
    Frame,
};

use super::panel;
use crate::app::{App, ConnectionField};

fn title(f: &mut Frame, text: &str, area: Rect) {
    let title = Paragraph::new(text)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(title, area);
}

pub fn render_selector(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints([Constraint::Length(3), Constraint::Min(5), Constraint::Length(3)])
        .split(area);

    title(f, "sqlpilot: pick a database to ask questions about", chunks[0]);

    if app.config.connections.is_empty() {
        let empty = Paragraph::new("No saved connections.\nPress 'n' to create a new connection.")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center)
            .block(panel("Saved Connections"));
        f.render_widget(empty, chunks[1]);
    } else {
        let items: Vec<ListItem> = app
            .config
            .connections
            .iter()
            .map(|profile| {
                ListItem::new(Line::from(vec![
                    Span::styled(profile.name.clone(), Style::default().fg(Color::White)),
                    Span::styled(
                        format!("  {}:{}/{}", profile.host, profile.port, profile.database),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(panel("Saved Connections"))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");

        let mut state = ListState::default().with_selected(Some(app.selected_profile));
        f.render_stateful_widget(list, chunks[1], &mut state);
    }

    let hint = Paragraph::new("Passwords are never saved; you are asked for one on connect.")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    f.render_widget(hint, chunks[2]);
}

pub fn render_editor(f: &mut Frame, app: &App, area: Rect) {
    let masked_password = "*".repeat(app.password.len());
    let fields = [
        (ConnectionField::Host, "Host", app.host.as_str()),
        (ConnectionField::Port, "Port", app.port.as_str()),
        (ConnectionField::Database, "Database", app.database.as_str()),
        (ConnectionField::User, "User", app.user.as_str()),
        (ConnectionField::Password, "Password", masked_password.as_str()),
    ];

    let mut constraints = vec![Constraint::Length(3)];
    constraints.extend(fields.iter().map(|_| Constraint::Length(3)));
    constraints.push(Constraint::Min(0));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(2)
        .constraints(constraints)
        .split(area);

    title(f, "PostgreSQL connection", chunks[0]);

    for (i, (field, label, value)) in fields.iter().enumerate() {
        let selected = app.connection_field == *field;
        let (text_style, border_color) = if selected {
            (Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD), Color::Cyan)
        } else {
            (Style::default().fg(Color::White), Color::Gray)
        };

        let input = Paragraph::new(*value)
            .style(text_style)
            .block(panel(*label).border_style(Style::default().fg(border_color)));
        f.render_widget(input, chunks[i + 1]);
    }
}
