use tokio_postgres::{Client, Row, SimpleQueryMessage};

use super::{QueryResult, RawColumnRow};
use crate::error::{AssistError, AssistResult};

/// Column, key and reference metadata for every base table, one row per
/// column (more when a column takes part in several foreign keys).
pub const COLUMN_METADATA_SQL: &str = "
SELECT
    c.table_schema::text AS table_schema,
    c.table_name::text AS table_name,
    c.column_name::text AS column_name,
    c.data_type::text AS data_type,
    c.character_maximum_length::int4 AS max_length,
    c.is_nullable = 'YES' AS is_nullable,
    pk.column_name IS NOT NULL AS is_primary_key,
    fk.constraint_name::text AS fk_constraint_name,
    ref.table_schema::text AS referenced_schema,
    ref.table_name::text AS referenced_table,
    ref.column_name::text AS referenced_column
FROM information_schema.tables t
JOIN information_schema.columns c
    ON c.table_schema = t.table_schema
    AND c.table_name = t.table_name
LEFT JOIN (
    SELECT kcu.table_schema, kcu.table_name, kcu.column_name
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON kcu.constraint_schema = tc.constraint_schema
        AND kcu.constraint_name = tc.constraint_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
) pk
    ON pk.table_schema = c.table_schema
    AND pk.table_name = c.table_name
    AND pk.column_name = c.column_name
LEFT JOIN (
    SELECT
        kcu.constraint_schema,
        kcu.constraint_name,
        kcu.table_schema,
        kcu.table_name,
        kcu.column_name,
        kcu.position_in_unique_constraint
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
        ON kcu.constraint_schema = tc.constraint_schema
        AND kcu.constraint_name = tc.constraint_name
    WHERE tc.constraint_type = 'FOREIGN KEY'
) fk
    ON fk.table_schema = c.table_schema
    AND fk.table_name = c.table_name
    AND fk.column_name = c.column_name
LEFT JOIN information_schema.referential_constraints rc
    ON rc.constraint_schema = fk.constraint_schema
    AND rc.constraint_name = fk.constraint_name
LEFT JOIN information_schema.key_column_usage ref
    ON ref.constraint_schema = rc.unique_constraint_schema
    AND ref.constraint_name = rc.unique_constraint_name
    AND ref.ordinal_position = fk.position_in_unique_constraint
WHERE t.table_type = 'BASE TABLE'
    AND t.table_schema NOT IN ('pg_catalog', 'information_schema')
ORDER BY c.table_schema, c.table_name, c.ordinal_position, fk.constraint_name";

fn column<'a, T>(row: &'a Row, idx: usize) -> AssistResult<Option<T>>
where
    T: tokio_postgres::types::FromSql<'a>,
{
    row.try_get::<_, Option<T>>(idx)
        .map_err(|e| AssistError::io(e).context("Unexpected catalog column"))
}

pub async fn fetch_raw_columns(client: &Client) -> AssistResult<Vec<RawColumnRow>> {
    let rows = client
        .query(COLUMN_METADATA_SQL, &[])
        .await
        .map_err(|e| AssistError::io(e).context("Failed to read column metadata"))?;

    rows.iter()
        .map(|row| -> AssistResult<RawColumnRow> {
            Ok(RawColumnRow {
                table_schema: column(row, 0)?,
                table_name: column(row, 1)?,
                column_name: column(row, 2)?,
                data_type: column(row, 3)?,
                max_length: column(row, 4)?,
                is_nullable: column(row, 5)?,
                is_primary_key: column(row, 6)?,
                fk_constraint_name: column(row, 7)?,
                referenced_schema: column(row, 8)?,
                referenced_table: column(row, 9)?,
                referenced_column: column(row, 10)?,
            })
        })
        .collect()
}

/// Run arbitrary SQL and render every value as text.
pub async fn execute_query(client: &Client, sql: &str) -> AssistResult<QueryResult> {
    let messages = client
        .simple_query(sql)
        .await
        .map_err(|e| AssistError::io(e).context("Failed to execute query"))?;

    let mut columns: Vec<String> = Vec::new();
    let mut rows: Vec<Vec<String>> = Vec::new();

    for message in messages {
        if let SimpleQueryMessage::Row(row) = message {
            if columns.is_empty() {
                columns = row
                    .columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect();
            }
            rows.push(
                (0..row.len())
                    .map(|i| row.get(i).unwrap_or("NULL").to_string())
                    .collect(),
            );
        }
    }

    let row_count = rows.len();

    Ok(QueryResult {
        columns,
        rows,
        row_count,
    })
}
