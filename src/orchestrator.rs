//! Question → schema-aware prompt → model → extracted SQL.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::db::ConnectionSource;
use crate::error::{AssistError, AssistResult};
use crate::llm::{CancellationToken, ChunkSink, ModelGateway, ModelMessage};
use crate::schema::{CompiledSchema, SchemaCache};

pub const SQL_FORMAT_INSTRUCTION: &str = "You must return your suggested SQL query in a markdown code block that begins with ```sql and ends with ```.";

pub const NO_CONNECTION_INFO: &str = "No connection info";

pub const NO_SQL_FOUND: &str = "No SQL query found in response.";

/// First fenced block: optional tag on the opening line, body up to the
/// next fence, trailing newline excluded.
static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n]*\n(.*?)\n?```").expect("valid fenced block regex"));

/// Body of the first fenced code block in `text`, if any.
pub fn extract_sql(text: &str) -> Option<&str> {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// The instruction message followed by schema and question.
pub fn build_messages(schema: &CompiledSchema, question: &str) -> Vec<ModelMessage> {
    vec![
        ModelMessage::user(SQL_FORMAT_INSTRUCTION),
        ModelMessage::user(format!("{}\n{}", schema, question)),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SqlAnswer {
    /// Full model text.
    pub value: String,
    /// First fenced block, empty when the model gave none.
    pub sql: String,
    pub error: Option<AssistError>,
}

impl SqlAnswer {
    fn unavailable(message: &str) -> Self {
        Self {
            error: Some(AssistError::Unavailable(message.to_string())),
            ..Default::default()
        }
    }

    /// The extracted SQL, or why there is none.
    pub fn require_sql(&self) -> AssistResult<&str> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.sql.is_empty() {
            return Err(AssistError::ParseMiss(NO_SQL_FOUND.to_string()));
        }
        Ok(&self.sql)
    }
}

pub struct QueryOrchestrator {
    connections: Arc<dyn ConnectionSource>,
    schemas: Arc<SchemaCache>,
    gateway: Arc<ModelGateway>,
}

impl QueryOrchestrator {
    pub fn new(
        connections: Arc<dyn ConnectionSource>,
        schemas: Arc<SchemaCache>,
        gateway: Arc<ModelGateway>,
    ) -> Self {
        Self {
            connections,
            schemas,
            gateway,
        }
    }

    pub fn schemas(&self) -> &Arc<SchemaCache> {
        &self.schemas
    }

    pub async fn get_sql(&self, question: &str, on_chunk: Option<ChunkSink<'_>>) -> AssistResult<SqlAnswer> {
        self.get_sql_with_cancel(question, on_chunk, None).await
    }

    pub async fn get_sql_with_cancel(
        &self,
        question: &str,
        on_chunk: Option<ChunkSink<'_>>,
        cancel: Option<&CancellationToken>,
    ) -> AssistResult<SqlAnswer> {
        let target = self
            .connections
            .acquire()
            .await
            .map_err(|e| e.context("Error getting connection"))?;
        let Some(target) = target else {
            return Ok(SqlAnswer::unavailable(NO_CONNECTION_INFO));
        };

        let schema = self.schemas.get_schema(&target).await?;
        let messages = build_messages(&schema, question);

        let response = self.gateway.ask(&messages, on_chunk, cancel).await?;
        let sql = extract_sql(&response.value).unwrap_or_default().to_string();
        if sql.is_empty() && response.error.is_none() {
            tracing::info!("Model answer had no fenced SQL block");
        }

        Ok(SqlAnswer {
            value: response.value,
            sql,
            error: response.error,
        })
    }
}
