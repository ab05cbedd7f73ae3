//! Renders catalog rows as bracket-quoted DDL for prompting.
//!
//! The output is an approximation of the live schema: one `CREATE TABLE`
//! per table followed by one `ALTER TABLE ... FOREIGN KEY` per constraint.
//! Statement order follows catalog enumeration order, so an unchanged
//! schema always compiles to the same bytes.

use std::collections::HashMap;
use std::fmt::{self, Write};
use std::sync::Arc;

use crate::db::ColumnMetadataRow;

/// Types that never take a length suffix, even when the catalog reports one.
pub const UNBOUNDED_TYPES: &[&str] = &["text", "ntext", "xml"];

/// Compiled DDL text. Clones share the same buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledSchema(Arc<str>);

impl CompiledSchema {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for CompiledSchema {
    fn from(ddl: String) -> Self {
        Self(Arc::from(ddl))
    }
}

impl fmt::Display for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Columns of one table in catalog order.
#[derive(Debug)]
pub struct TableDefinition<'a> {
    pub schema: &'a str,
    pub name: &'a str,
    pub columns: Vec<&'a ColumnMetadataRow>,
}

impl<'a> TableDefinition<'a> {
    pub fn primary_key(&self) -> impl Iterator<Item = &'a ColumnMetadataRow> + '_ {
        self.columns.iter().copied().filter(|c| c.is_primary_key)
    }
}

/// Rows of one foreign-key constraint in catalog order.
///
/// Every row is assumed to share the table and referenced table of the first.
#[derive(Debug)]
pub struct ForeignKeyDefinition<'a> {
    pub name: &'a str,
    pub rows: Vec<&'a ColumnMetadataRow>,
}

impl<'a> ForeignKeyDefinition<'a> {
    /// (local column, referenced column) pairs.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&'a str, &'a str)> + '_ {
        self.rows.iter().copied().filter_map(|row: &'a ColumnMetadataRow| {
            row.foreign_key
                .as_ref()
                .map(|fk| (row.column_name.as_str(), fk.referenced_column.as_str()))
        })
    }
}

/// Group rows by (schema, table), keeping first-seen order.
///
/// A column reported once per foreign key it belongs to is kept only once.
pub fn group_tables(rows: &[ColumnMetadataRow]) -> Vec<TableDefinition<'_>> {
    let mut tables: Vec<TableDefinition<'_>> = Vec::new();
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();

    for row in rows {
        let key = (row.table_schema.as_str(), row.table_name.as_str());
        let slot = *index.entry(key).or_insert_with(|| {
            tables.push(TableDefinition {
                schema: key.0,
                name: key.1,
                columns: Vec::new(),
            });
            tables.len() - 1
        });
        let columns = &mut tables[slot].columns;
        if !columns.iter().any(|c| c.column_name == row.column_name) {
            columns.push(row);
        }
    }

    tables
}

/// Group foreign-key rows by constraint name, keeping first-seen order.
pub fn group_foreign_keys(rows: &[ColumnMetadataRow]) -> Vec<ForeignKeyDefinition<'_>> {
    let mut keys: Vec<ForeignKeyDefinition<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let Some(fk) = &row.foreign_key else {
            continue;
        };
        let name = fk.constraint_name.as_str();
        let slot = *index.entry(name).or_insert_with(|| {
            keys.push(ForeignKeyDefinition {
                name,
                rows: Vec::new(),
            });
            keys.len() - 1
        });
        keys[slot].rows.push(row);
    }

    keys
}

fn column_clause(col: &ColumnMetadataRow) -> String {
    let mut def = format!("  [{}] {}", col.column_name, col.data_type);

    if let Some(length) = col.max_length {
        let unbounded = UNBOUNDED_TYPES
            .iter()
            .any(|t| t.eq_ignore_ascii_case(&col.data_type));
        if !unbounded {
            if length < 0 {
                def.push_str("(max)");
            } else {
                def.push_str(&format!("({})", length));
            }
        }
    }

    def.push_str(if col.is_nullable { " NULL" } else { " NOT NULL" });
    def
}

fn bracket_list<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names
        .map(|name| format!("[{}]", name))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaCompiler;

impl SchemaCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Compile rows pre-sorted by schema, table and ordinal position.
    pub fn compile(&self, rows: &[ColumnMetadataRow]) -> CompiledSchema {
        let mut ddl = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_ddl(&mut ddl, rows);
        CompiledSchema::from(ddl)
    }

    fn write_ddl(&self, ddl: &mut String, rows: &[ColumnMetadataRow]) -> fmt::Result {
        for table in group_tables(rows) {
            writeln!(ddl, "CREATE TABLE [{}].[{}] (", table.schema, table.name)?;

            let columns: Vec<String> = table.columns.iter().map(|c| column_clause(c)).collect();
            ddl.push_str(&columns.join(",\n"));

            let pk = bracket_list(table.primary_key().map(|c| c.column_name.as_str()));
            if !pk.is_empty() {
                write!(ddl, ",\n  CONSTRAINT [PK_{}] PRIMARY KEY ({})", table.name, pk)?;
            }

            ddl.push_str("\n);\n\n");
        }

        for fk in group_foreign_keys(rows) {
            let Some(first) = fk.rows.first() else {
                continue;
            };
            let Some(reference) = &first.foreign_key else {
                continue;
            };

            writeln!(ddl, "ALTER TABLE [{}].[{}]", first.table_schema, first.table_name)?;
            writeln!(
                ddl,
                "ADD CONSTRAINT [{}] FOREIGN KEY ({})",
                fk.name,
                bracket_list(fk.column_pairs().map(|(local, _)| local))
            )?;
            write!(
                ddl,
                "REFERENCES [{}].[{}] ({});\n\n",
                reference.referenced_schema,
                reference.referenced_table,
                bracket_list(fk.column_pairs().map(|(_, referenced)| referenced))
            )?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ForeignKeyRef;

    fn col(table: &str, name: &str, data_type: &str) -> ColumnMetadataRow {
        ColumnMetadataRow {
            table_schema: "dbo".to_string(),
            table_name: table.to_string(),
            column_name: name.to_string(),
            data_type: data_type.to_string(),
            max_length: None,
            is_nullable: true,
            is_primary_key: false,
            foreign_key: None,
        }
    }

    fn pk(mut row: ColumnMetadataRow) -> ColumnMetadataRow {
        row.is_primary_key = true;
        row.is_nullable = false;
        row
    }

    fn fk(mut row: ColumnMetadataRow, name: &str, table: &str, column: &str) -> ColumnMetadataRow {
        row.foreign_key = Some(ForeignKeyRef {
            constraint_name: name.to_string(),
            referenced_schema: "dbo".to_string(),
            referenced_table: table.to_string(),
            referenced_column: column.to_string(),
        });
        row
    }

    fn orders_and_customers() -> Vec<ColumnMetadataRow> {
        vec![
            pk(col("Customers", "Id", "int")),
            {
                let mut name = col("Customers", "Name", "nvarchar");
                name.max_length = Some(100);
                name
            },
            pk(col("Orders", "Id", "int")),
            fk(col("Orders", "CustomerId", "int"), "FK_Orders_Customers", "Customers", "Id"),
        ]
    }

    #[test]
    fn test_compile_two_tables_with_foreign_key() {
        let ddl = SchemaCompiler::new().compile(&orders_and_customers());

        let expected = "\
CREATE TABLE [dbo].[Customers] (
  [Id] int NOT NULL,
  [Name] nvarchar(100) NULL,
  CONSTRAINT [PK_Customers] PRIMARY KEY ([Id])
);

CREATE TABLE [dbo].[Orders] (
  [Id] int NOT NULL,
  [CustomerId] int NULL,
  CONSTRAINT [PK_Orders] PRIMARY KEY ([Id])
);

ALTER TABLE [dbo].[Orders]
ADD CONSTRAINT [FK_Orders_Customers] FOREIGN KEY ([CustomerId])
REFERENCES [dbo].[Customers] ([Id]);

";
        assert_eq!(ddl.as_str(), expected);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let rows = orders_and_customers();
        let compiler = SchemaCompiler::new();
        assert_eq!(compiler.compile(&rows), compiler.compile(&rows));
    }

    #[test]
    fn test_tables_keep_first_seen_order() {
        let rows = vec![
            col("Zebra", "a", "int"),
            col("Apple", "a", "int"),
            col("Mango", "a", "int"),
            col("Apple", "b", "int"),
        ];
        let ddl = SchemaCompiler::new().compile(&rows);
        let text = ddl.as_str();

        assert_eq!(text.matches("CREATE TABLE").count(), 3);
        let zebra = text.find("[Zebra]").unwrap();
        let apple = text.find("[Apple]").unwrap();
        let mango = text.find("[Mango]").unwrap();
        assert!(zebra < apple && apple < mango);
        assert!(text.contains("  [a] int NULL,\n  [b] int NULL\n);"));
    }

    #[test]
    fn test_composite_primary_key_in_column_order() {
        let rows = vec![
            pk(col("OrderLines", "OrderId", "int")),
            col("OrderLines", "Quantity", "int"),
            pk(col("OrderLines", "LineNo", "int")),
        ];
        let ddl = SchemaCompiler::new().compile(&rows);
        assert!(ddl
            .as_str()
            .contains("CONSTRAINT [PK_OrderLines] PRIMARY KEY ([OrderId], [LineNo])"));
    }

    #[test]
    fn test_no_primary_key_clause_without_flagged_columns() {
        let rows = vec![col("Log", "Message", "text")];
        let ddl = SchemaCompiler::new().compile(&rows);
        assert!(!ddl.as_str().contains("PRIMARY KEY"));
        assert_eq!(ddl.as_str(), "CREATE TABLE [dbo].[Log] (\n  [Message] text NULL\n);\n\n");
    }

    #[test]
    fn test_multi_column_foreign_key_pairs() {
        let rows = vec![
            fk(col("Shipments", "OrderId", "int"), "FK_Ship_Lines", "OrderLines", "OrderId"),
            fk(col("Shipments", "LineNo", "int"), "FK_Ship_Lines", "OrderLines", "LineNo"),
        ];
        let ddl = SchemaCompiler::new().compile(&rows);
        assert!(ddl.as_str().contains(
            "FOREIGN KEY ([OrderId], [LineNo])\nREFERENCES [dbo].[OrderLines] ([OrderId], [LineNo]);"
        ));
    }

    #[test]
    fn test_column_in_two_foreign_keys_is_declared_once() {
        let rows = vec![
            pk(fk(col("Transfers", "AccountId", "int"), "FK_Transfers_Accounts", "Accounts", "Id")),
            pk(fk(col("Transfers", "AccountId", "int"), "FK_Transfers_Ledgers", "Ledgers", "AccountId")),
            pk(col("Transfers", "Seq", "int")),
        ];
        let ddl = SchemaCompiler::new().compile(&rows);
        let text = ddl.as_str();

        assert_eq!(text.matches("  [AccountId] int NOT NULL").count(), 1);
        assert!(text.contains("PRIMARY KEY ([AccountId], [Seq])"));
        assert!(text.contains("FOREIGN KEY ([AccountId])\nREFERENCES [dbo].[Accounts] ([Id]);"));
        assert!(text.contains("FOREIGN KEY ([AccountId])\nREFERENCES [dbo].[Ledgers] ([AccountId]);"));
    }

    #[test]
    fn test_foreign_keys_keep_first_seen_order() {
        let rows = vec![
            fk(col("B", "x", "int"), "FK_second_alpha", "A", "id"),
            fk(col("C", "y", "int"), "FK_first_alpha", "A", "id"),
        ];
        let ddl = SchemaCompiler::new().compile(&rows);
        let text = ddl.as_str();
        assert_eq!(text.matches("ALTER TABLE").count(), 2);
        assert!(text.find("FK_second_alpha").unwrap() < text.find("FK_first_alpha").unwrap());
    }

    #[test]
    fn test_length_suffix_policy() {
        let mut text = col("Notes", "Body", "TEXT");
        text.max_length = Some(2147483647);
        let mut varchar = col("Notes", "Title", "varchar");
        varchar.max_length = Some(200);
        let mut unlimited = col("Notes", "Blob", "nvarchar");
        unlimited.max_length = Some(-1);

        let ddl = SchemaCompiler::new().compile(&[text, varchar, unlimited]);
        let text = ddl.as_str();
        assert!(text.contains("  [Body] TEXT NULL"));
        assert!(text.contains("  [Title] varchar(200) NULL"));
        assert!(text.contains("  [Blob] nvarchar(max) NULL"));
    }

    #[test]
    fn test_empty_input_compiles_to_empty_schema() {
        assert!(SchemaCompiler::new().compile(&[]).is_empty());
    }
}
