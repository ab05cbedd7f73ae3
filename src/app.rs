use std::sync::Arc;

use anyhow::Result;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Borders};
use tokio::sync::mpsc::UnboundedSender;
use tui_textarea::TextArea;

use sqlpilot::config::{Config, ConnectionProfile};
use sqlpilot::db::{self, ActiveConnection, DbConnection, QueryResult};
use sqlpilot::orchestrator::NO_SQL_FOUND;
use sqlpilot::{AssistError, CancellationToken, QueryOrchestrator, SqlAnswer};

use crate::events::AppEvent;

mod connection_selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    ConnectionSelector,
    ConnectionEdit,
    Chat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionField {
    Host,
    Port,
    Database,
    User,
    Password,
}

pub struct App {
    pub mode: AppMode,
    pub connection_field: ConnectionField,

    // Connection selector
    pub config: Config,
    pub selected_profile: usize,

    // Connection fields
    pub host: String,
    pub port: String,
    pub database: String,
    pub user: String,
    pub password: String,

    // Database connection
    pub db: DbConnection,
    pub active: ActiveConnection,
    pub orchestrator: Arc<QueryOrchestrator>,

    // Chat state
    pub question: TextArea<'static>,
    pub asked: String,
    pub answer: String,
    pub sql: String,
    pub in_flight: Option<CancellationToken>,
    pub query_result: Option<QueryResult>,

    // UI state
    pub error_message: Option<String>,
    pub status_message: Option<String>,

    events: UnboundedSender<AppEvent>,
}

fn question_editor() -> TextArea<'static> {
    let mut editor = TextArea::default();
    editor.set_block(
        Block::default()
            .borders(Borders::ALL)
            .title("Question (Enter to ask, Alt+Enter for newline)")
            .border_style(Style::default().fg(Color::Cyan)),
    );
    editor.set_placeholder_text("e.g. which customers ordered more than 3 times last month?");
    editor.set_cursor_line_style(Style::default());
    editor
}

impl App {
    pub fn new(config: Config, events: UnboundedSender<AppEvent>) -> Self {
        let active = ActiveConnection::default();
        let orchestrator = Arc::new(sqlpilot::build_orchestrator(
            &config.llm,
            Arc::new(active.clone()),
        ));

        Self {
            mode: AppMode::ConnectionSelector,
            connection_field: ConnectionField::Host,
            config,
            selected_profile: 0,
            host: "localhost".to_string(),
            port: "5432".to_string(),
            database: "postgres".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            db: DbConnection::new(),
            active,
            orchestrator,
            question: question_editor(),
            asked: String::new(),
            answer: String::new(),
            sql: String::new(),
            in_flight: None,
            query_result: None,
            error_message: None,
            status_message: None,
            events,
        }
    }

    pub fn set_error(&mut self, msg: String) {
        tracing::warn!("{}", msg);
        self.error_message = Some(msg);
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    // Connection field navigation
    pub fn next_connection_field(&mut self) {
        self.connection_field = match self.connection_field {
            ConnectionField::Host => ConnectionField::Port,
            ConnectionField::Port => ConnectionField::Database,
            ConnectionField::Database => ConnectionField::User,
            ConnectionField::User => ConnectionField::Password,
            ConnectionField::Password => ConnectionField::Host,
        };
    }

    pub fn prev_connection_field(&mut self) {
        self.connection_field = match self.connection_field {
            ConnectionField::Host => ConnectionField::Password,
            ConnectionField::Port => ConnectionField::Host,
            ConnectionField::Database => ConnectionField::Port,
            ConnectionField::User => ConnectionField::Database,
            ConnectionField::Password => ConnectionField::User,
        };
    }

    fn current_field(&mut self) -> &mut String {
        match self.connection_field {
            ConnectionField::Host => &mut self.host,
            ConnectionField::Port => &mut self.port,
            ConnectionField::Database => &mut self.database,
            ConnectionField::User => &mut self.user,
            ConnectionField::Password => &mut self.password,
        }
    }

    pub fn input_char(&mut self, c: char) {
        self.current_field().push(c);
    }

    pub fn delete_char(&mut self) {
        self.current_field().pop();
    }

    fn edited_profile(&self) -> ConnectionProfile {
        ConnectionProfile {
            name: format!("{}@{}/{}", self.user, self.host, self.database),
            host: self.host.clone(),
            port: self.port.clone(),
            database: self.database.clone(),
            user: self.user.clone(),
        }
    }

    // Database connection
    pub async fn connect(&mut self) -> Result<()> {
        let profile = self.edited_profile();
        let target = profile.to_target(&self.password)?;

        self.db.connect(target.clone()).await?;
        self.active.set(Some(target));

        if self.config.remember(profile) {
            if let Err(e) = self.config.save() {
                tracing::warn!("Could not save connection config: {}", e);
            }
        }

        self.clear_error();
        self.reset_chat();
        self.mode = AppMode::Chat;
        self.set_status(format!("Connected to {}", self.database));
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.db.disconnect();
        self.active.set(None);
        self.reset_chat();
        self.mode = AppMode::ConnectionSelector;
    }

    fn reset_chat(&mut self) {
        self.question = question_editor();
        self.asked.clear();
        self.answer.clear();
        self.sql.clear();
        self.query_result = None;
        self.status_message = None;
    }

    // Question handling
    pub fn ask(&mut self) {
        if self.is_busy() {
            return;
        }

        let question = self.question.lines().join("\n").trim().to_string();
        if question.is_empty() {
            return;
        }

        self.clear_error();
        self.asked = question.clone();
        self.answer.clear();
        self.sql.clear();
        self.query_result = None;
        self.question = question_editor();
        self.set_status("Waiting for the model...");

        let cancel = CancellationToken::new();
        self.in_flight = Some(cancel.clone());

        let orchestrator = self.orchestrator.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let chunks = events.clone();
            let mut sink = move |chunk: &str| {
                let _ = chunks.send(AppEvent::Chunk(chunk.to_string()));
            };
            let result = orchestrator
                .get_sql_with_cancel(&question, Some(&mut sink), Some(&cancel))
                .await;
            let _ = events.send(AppEvent::Answer(result));
        });
    }

    /// Cancel the in-flight request; returns `false` when there is none.
    pub fn cancel_request(&mut self) -> bool {
        match &self.in_flight {
            Some(token) => {
                token.cancel();
                self.set_status("Cancelling...");
                true
            }
            None => false,
        }
    }

    pub fn on_chunk(&mut self, chunk: &str) {
        self.answer.push_str(chunk);
    }

    pub fn on_answer(&mut self, result: Result<SqlAnswer, AssistError>) {
        self.in_flight = None;
        match result {
            Ok(answer) => {
                self.answer = answer.value.clone();
                self.sql = answer.sql.clone();
                match answer.require_sql() {
                    Ok(_) => {
                        self.clear_error();
                        self.set_status("SQL ready, press F5 to run it");
                    }
                    Err(e) => {
                        self.status_message = None;
                        self.set_error(e.to_string());
                    }
                }
            }
            Err(AssistError::Cancelled) => {
                self.set_status("Request cancelled");
            }
            Err(e) => {
                self.status_message = None;
                self.set_error(e.to_string());
            }
        }
    }

    pub async fn run_sql(&mut self) {
        if self.sql.is_empty() {
            self.set_error(NO_SQL_FOUND.to_string());
            return;
        }

        let Some(client) = self.db.client() else {
            self.set_error("Not connected".to_string());
            return;
        };

        match db::execute_query(client, &self.sql).await {
            Ok(result) => {
                self.set_status(format!("Query returned {} rows", result.row_count));
                self.query_result = Some(result);
                self.clear_error();
            }
            Err(e) => {
                self.set_error(format!("Query error: {}", e));
            }
        }
    }

    pub fn refresh_schema(&mut self) {
        let Some(target) = self.active.get() else {
            return;
        };
        match self.orchestrator.schemas().invalidate(&target) {
            Ok(true) => self.set_status("Schema will be reloaded on the next question"),
            Ok(false) => self.set_status("Schema not loaded yet"),
            Err(e) => self.set_error(e.to_string()),
        }
    }
}
