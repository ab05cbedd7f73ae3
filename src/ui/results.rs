use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Paragraph, Row, Table},
    Frame,
};

use super::panel;
use crate::app::App;

pub fn render_results(f: &mut Frame, app: &App, area: Rect) {
    let Some(result) = &app.query_result else {
        let help = Paragraph::new("No results yet.\n\nOnce the model suggests a query, press F5 to run it here.")
            .style(Style::default().fg(Color::DarkGray))
            .block(panel("Results"));
        f.render_widget(help, area);
        return;
    };

    if result.rows.is_empty() {
        let empty = Paragraph::new("Query executed successfully. No rows returned.")
            .style(Style::default().fg(Color::Green))
            .block(panel("Results"));
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(result.columns.clone())
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .bottom_margin(1);

    let rows: Vec<Row> = result
        .rows
        .iter()
        .map(|row| Row::new(row.clone()))
        .collect();

    // Equal share per column
    let col_count = result.columns.len().max(1) as u32;
    let widths: Vec<Constraint> = (0..col_count)
        .map(|_| Constraint::Ratio(1, col_count))
        .collect();

    let table = Table::new(rows, widths)
        .header(header)
        .block(panel(format!("Results ({} rows)", result.row_count)));

    f.render_widget(table, area);
}
