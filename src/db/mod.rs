mod connection;
mod queries;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AssistResult;

pub use connection::{open_client, DbConnection};
pub use queries::*;

/// Everything needed to reach one database, credentials included.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTarget {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl ConnectionTarget {
    pub fn pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.user)
            .password(&self.password);
        config
    }
}

/// Reference half of a foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub constraint_name: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

/// One (table, column) pair reported by catalog introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMetadataRow {
    pub table_schema: String,
    pub table_name: String,
    pub column_name: String,
    pub data_type: String,
    pub max_length: Option<i32>,
    pub is_nullable: bool,
    pub is_primary_key: bool,
    pub foreign_key: Option<ForeignKeyRef>,
}

/// Catalog row before validation; every column may be missing.
#[derive(Debug, Clone, Default)]
pub struct RawColumnRow {
    pub table_schema: Option<String>,
    pub table_name: Option<String>,
    pub column_name: Option<String>,
    pub data_type: Option<String>,
    pub max_length: Option<i32>,
    pub is_nullable: Option<bool>,
    pub is_primary_key: Option<bool>,
    pub fk_constraint_name: Option<String>,
    pub referenced_schema: Option<String>,
    pub referenced_table: Option<String>,
    pub referenced_column: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    #[error("catalog row is missing {0}")]
    MissingField(&'static str),
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RowError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(RowError::MissingField(field))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl TryFrom<RawColumnRow> for ColumnMetadataRow {
    type Error = RowError;

    fn try_from(raw: RawColumnRow) -> Result<Self, Self::Error> {
        let table_schema = required(raw.table_schema, "table_schema")?;
        let table_name = required(raw.table_name, "table_name")?;
        let column_name = required(raw.column_name, "column_name")?;
        let data_type = required(raw.data_type, "data_type")?;

        let foreign_key = match non_empty(raw.fk_constraint_name) {
            Some(constraint_name) => match (
                non_empty(raw.referenced_schema),
                non_empty(raw.referenced_table),
                non_empty(raw.referenced_column),
            ) {
                (Some(referenced_schema), Some(referenced_table), Some(referenced_column)) => {
                    Some(ForeignKeyRef {
                        constraint_name,
                        referenced_schema,
                        referenced_table,
                        referenced_column,
                    })
                }
                _ => {
                    tracing::warn!(
                        "Dropping foreign key {} on {}.{}.{}: incomplete reference",
                        constraint_name,
                        table_schema,
                        table_name,
                        column_name
                    );
                    None
                }
            },
            None => None,
        };

        Ok(ColumnMetadataRow {
            table_schema,
            table_name,
            column_name,
            data_type,
            max_length: raw.max_length,
            is_nullable: raw.is_nullable.unwrap_or(true),
            is_primary_key: raw.is_primary_key.unwrap_or(false),
            foreign_key,
        })
    }
}

/// Validate raw catalog rows, skipping the ones that cannot be compiled.
pub fn validate_rows(raw: Vec<RawColumnRow>) -> Vec<ColumnMetadataRow> {
    raw.into_iter()
        .filter_map(|row| match ColumnMetadataRow::try_from(row) {
            Ok(row) => Some(row),
            Err(e) => {
                tracing::warn!("Skipping catalog row: {}", e);
                None
            }
        })
        .collect()
}

/// Source of column metadata for a connection target.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Rows ordered by schema, table, then ordinal position.
    async fn fetch_columns(&self, target: &ConnectionTarget) -> AssistResult<Vec<ColumnMetadataRow>>;
}

/// Introspects PostgreSQL through `information_schema`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PgCatalog;

#[async_trait]
impl CatalogSource for PgCatalog {
    async fn fetch_columns(&self, target: &ConnectionTarget) -> AssistResult<Vec<ColumnMetadataRow>> {
        let client = open_client(target).await?;
        let raw = fetch_raw_columns(&client).await?;
        let fetched = raw.len();
        let rows = validate_rows(raw);
        tracing::info!(
            "Introspected {} columns ({} rejected) from {}/{}",
            rows.len(),
            fetched - rows.len(),
            target.host,
            target.database
        );
        Ok(rows)
    }
}

/// Yields the target to ask against, or `None` when nothing is connected.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    async fn acquire(&self) -> AssistResult<Option<ConnectionTarget>>;
}

/// The target the user is currently connected to.
#[derive(Debug, Default, Clone)]
pub struct ActiveConnection {
    target: Arc<RwLock<Option<ConnectionTarget>>>,
}

impl ActiveConnection {
    pub fn new(target: Option<ConnectionTarget>) -> Self {
        Self {
            target: Arc::new(RwLock::new(target)),
        }
    }

    pub fn set(&self, target: Option<ConnectionTarget>) {
        *self.target.write().unwrap_or_else(PoisonError::into_inner) = target;
    }

    pub fn get(&self) -> Option<ConnectionTarget> {
        self.target
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ConnectionSource for ActiveConnection {
    async fn acquire(&self) -> AssistResult<Option<ConnectionTarget>> {
        Ok(self.get())
    }
}

#[derive(Debug, Clone)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(column: &str) -> RawColumnRow {
        RawColumnRow {
            table_schema: Some("public".to_string()),
            table_name: Some("orders".to_string()),
            column_name: Some(column.to_string()),
            data_type: Some("integer".to_string()),
            is_nullable: Some(false),
            is_primary_key: Some(false),
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_row_with_foreign_key() {
        let mut row = raw("customer_id");
        row.fk_constraint_name = Some("fk_orders_customers".to_string());
        row.referenced_schema = Some("public".to_string());
        row.referenced_table = Some("customers".to_string());
        row.referenced_column = Some("id".to_string());

        let row = ColumnMetadataRow::try_from(row).unwrap();
        let fk = row.foreign_key.unwrap();
        assert_eq!(fk.constraint_name, "fk_orders_customers");
        assert_eq!(fk.referenced_table, "customers");
    }

    #[test]
    fn test_incomplete_reference_drops_foreign_key() {
        let mut row = raw("customer_id");
        row.fk_constraint_name = Some("fk_orders_customers".to_string());
        row.referenced_table = Some("customers".to_string());

        let row = ColumnMetadataRow::try_from(row).unwrap();
        assert!(row.foreign_key.is_none());
    }

    #[test]
    fn test_empty_column_name_is_rejected() {
        let row = raw("");
        assert_eq!(
            ColumnMetadataRow::try_from(row),
            Err(RowError::MissingField("column_name"))
        );
    }

    #[test]
    fn test_validate_rows_skips_bad_rows() {
        let mut missing_table = raw("id");
        missing_table.table_name = None;

        let rows = validate_rows(vec![raw("id"), missing_table, raw("total")]);
        let names: Vec<_> = rows.iter().map(|r| r.column_name.as_str()).collect();
        assert_eq!(names, vec!["id", "total"]);
    }

    #[test]
    fn test_debug_redacts_password() {
        let target = ConnectionTarget {
            host: "localhost".to_string(),
            port: 5432,
            database: "shop".to_string(),
            user: "postgres".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{:?}", target);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("shop"));
    }

    #[tokio::test]
    async fn test_active_connection_tracks_target() {
        let active = ActiveConnection::default();
        assert!(active.acquire().await.unwrap().is_none());

        active.set(Some(ConnectionTarget {
            host: "db".to_string(),
            port: 5432,
            database: "shop".to_string(),
            user: "app".to_string(),
            password: String::new(),
        }));
        let target = active.acquire().await.unwrap().unwrap();
        assert_eq!(target.database, "shop");
    }
}
