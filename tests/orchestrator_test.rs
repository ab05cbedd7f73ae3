//! End-to-end question flow with mocked catalog, connection and model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sqlpilot::db::{ActiveConnection, CatalogSource, ColumnMetadataRow, ConnectionSource, ConnectionTarget, ForeignKeyRef};
use sqlpilot::llm::{
    CancellationToken, ChatModel, ChunkStream, ModelGateway, ModelMessage, ModelProvider, ModelSelector,
};
use sqlpilot::orchestrator::{QueryOrchestrator, NO_CONNECTION_INFO, SQL_FORMAT_INSTRUCTION};
use sqlpilot::{AssistError, AssistResult, ErrorKind, SchemaCache};

fn column(table: &str, name: &str, primary: bool) -> ColumnMetadataRow {
    ColumnMetadataRow {
        table_schema: "dbo".to_string(),
        table_name: table.to_string(),
        column_name: name.to_string(),
        data_type: "int".to_string(),
        max_length: None,
        is_nullable: !primary,
        is_primary_key: primary,
        foreign_key: None,
    }
}

/// Orders and Customers, with Orders.CustomerId referencing Customers.Id.
struct ShopCatalog {
    calls: AtomicUsize,
}

#[async_trait]
impl CatalogSource for ShopCatalog {
    async fn fetch_columns(&self, _target: &ConnectionTarget) -> AssistResult<Vec<ColumnMetadataRow>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut customer_id = column("Orders", "CustomerId", false);
        customer_id.foreign_key = Some(ForeignKeyRef {
            constraint_name: "FK_Orders_Customers".to_string(),
            referenced_schema: "dbo".to_string(),
            referenced_table: "Customers".to_string(),
            referenced_column: "Id".to_string(),
        });
        Ok(vec![
            column("Customers", "Id", true),
            column("Orders", "Id", true),
            customer_id,
        ])
    }
}

struct FailingConnection;

#[async_trait]
impl ConnectionSource for FailingConnection {
    async fn acquire(&self) -> AssistResult<Option<ConnectionTarget>> {
        Err(AssistError::Unavailable("driver missing".to_string()))
    }
}

/// Replies with a fixed answer split into two chunks.
struct CannedModel {
    reply: &'static str,
    prompts: Mutex<Vec<Vec<ModelMessage>>>,
}

#[async_trait]
impl ChatModel for CannedModel {
    fn id(&self) -> &str {
        "canned"
    }

    async fn send_request(&self, messages: &[ModelMessage], _cancel: CancellationToken) -> AssistResult<ChunkStream> {
        self.prompts.lock().unwrap().push(messages.to_vec());

        let (tx, stream) = ChunkStream::channel();
        let (head, tail) = self.reply.split_at(self.reply.len() / 2);
        let (head, tail) = (head.to_string(), tail.to_string());
        tokio::spawn(async move {
            tx.chunk(head).await;
            tx.chunk(tail).await;
            tx.done().await;
        });
        Ok(stream)
    }
}

struct CannedProvider {
    model: Arc<CannedModel>,
}

#[async_trait]
impl ModelProvider for CannedProvider {
    async fn select_chat_models(&self, _selector: &ModelSelector) -> AssistResult<Vec<Arc<dyn ChatModel>>> {
        Ok(vec![self.model.clone() as Arc<dyn ChatModel>])
    }
}

struct Fixture {
    catalog: Arc<ShopCatalog>,
    model: Arc<CannedModel>,
    orchestrator: QueryOrchestrator,
}

fn target() -> ConnectionTarget {
    ConnectionTarget {
        host: "sql.example.com".to_string(),
        port: 5432,
        database: "shop".to_string(),
        user: "analyst".to_string(),
        password: "token".to_string(),
    }
}

fn fixture(reply: &'static str, connections: Arc<dyn ConnectionSource>) -> Fixture {
    let catalog = Arc::new(ShopCatalog {
        calls: AtomicUsize::new(0),
    });
    let model = Arc::new(CannedModel {
        reply,
        prompts: Mutex::new(Vec::new()),
    });
    let schemas = Arc::new(SchemaCache::new(catalog.clone()));
    let gateway = Arc::new(ModelGateway::new(
        Arc::new(CannedProvider { model: model.clone() }),
        ModelSelector::default(),
    ));
    Fixture {
        catalog,
        model,
        orchestrator: QueryOrchestrator::new(connections, schemas, gateway),
    }
}

#[tokio::test]
async fn test_question_yields_extracted_sql() {
    let fx = fixture(
        "```sql\nSELECT * FROM Orders\n```",
        Arc::new(ActiveConnection::new(Some(target()))),
    );

    let mut streamed = String::new();
    let mut sink = |chunk: &str| streamed.push_str(chunk);
    let answer = fx.orchestrator.get_sql("show orders", Some(&mut sink)).await.unwrap();

    assert_eq!(answer.sql, "SELECT * FROM Orders");
    assert_eq!(answer.error, None);
    assert_eq!(answer.value, "```sql\nSELECT * FROM Orders\n```");
    assert_eq!(streamed, answer.value);

    let prompts = fx.model.prompts.lock().unwrap();
    let prompt = &prompts[0];
    assert_eq!(prompt.len(), 2);
    assert_eq!(prompt[0].content(), SQL_FORMAT_INSTRUCTION);
    assert!(prompt[1].content().starts_with("CREATE TABLE [dbo].[Customers] ("));
    assert!(prompt[1]
        .content()
        .contains("ADD CONSTRAINT [FK_Orders_Customers] FOREIGN KEY ([CustomerId])\nREFERENCES [dbo].[Customers] ([Id]);"));
    assert!(prompt[1].content().ends_with("\nshow orders"));
}

#[tokio::test]
async fn test_schema_is_introspected_once_per_target() {
    let fx = fixture(
        "```sql\nSELECT 1\n```",
        Arc::new(ActiveConnection::new(Some(target()))),
    );

    fx.orchestrator.get_sql("first", None).await.unwrap();
    fx.orchestrator.get_sql("second", None).await.unwrap();

    assert_eq!(fx.catalog.calls.load(Ordering::SeqCst), 1);
    assert_eq!(fx.model.prompts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_answer_without_block_has_empty_sql() {
    let fx = fixture(
        "I can't answer that from this schema.",
        Arc::new(ActiveConnection::new(Some(target()))),
    );

    let answer = fx.orchestrator.get_sql("what is the weather", None).await.unwrap();
    assert_eq!(answer.sql, "");
    assert_eq!(answer.error, None);
    assert_eq!(answer.require_sql().unwrap_err().kind(), ErrorKind::ParseMiss);
}

#[tokio::test]
async fn test_missing_connection_short_circuits() {
    let fx = fixture("```sql\nSELECT 1\n```", Arc::new(ActiveConnection::default()));

    let answer = fx.orchestrator.get_sql("show orders", None).await.unwrap();
    assert_eq!(answer.value, "");
    assert_eq!(answer.sql, "");
    assert_eq!(answer.error, Some(AssistError::Unavailable(NO_CONNECTION_INFO.to_string())));
    assert_eq!(fx.catalog.calls.load(Ordering::SeqCst), 0);
    assert!(fx.model.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_connection_failure_is_wrapped() {
    let fx = fixture("```sql\nSELECT 1\n```", Arc::new(FailingConnection));

    let err = fx.orchestrator.get_sql("show orders", None).await.unwrap_err();
    assert_eq!(
        err,
        AssistError::Unavailable("Error getting connection: driver missing".to_string())
    );
}
