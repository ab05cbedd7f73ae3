pub mod config;
pub mod db;
pub mod error;
pub mod llm;
pub mod logging;
pub mod orchestrator;
pub mod schema;

use std::sync::Arc;

pub use config::{Config, ConnectionProfile, LlmSettings};
pub use db::{ActiveConnection, CatalogSource, ColumnMetadataRow, ConnectionSource, ConnectionTarget, PgCatalog};
pub use error::{AssistError, AssistResult, ErrorKind};
pub use llm::{CancellationToken, ModelGateway, ModelMessage, ModelResponse, ModelSelector};
pub use orchestrator::{extract_sql, QueryOrchestrator, SqlAnswer};
pub use schema::{CompiledSchema, SchemaCache, SchemaCompiler};

/// Wire the Postgres catalog and the configured HTTP models into an orchestrator.
pub fn build_orchestrator(llm: &LlmSettings, connections: Arc<dyn ConnectionSource>) -> QueryOrchestrator {
    let schemas = Arc::new(SchemaCache::new(Arc::new(PgCatalog)));
    let provider = Arc::new(llm::openai::HttpModelProvider::new(llm.endpoints.clone()));
    let gateway = Arc::new(ModelGateway::new(provider, llm.selector.clone()));
    QueryOrchestrator::new(connections, schemas, gateway)
}
