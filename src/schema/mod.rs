mod cache;
mod compiler;

pub use cache::{cache_key, compute_hash, SchemaCache};
pub use compiler::{
    group_foreign_keys, group_tables, CompiledSchema, ForeignKeyDefinition, SchemaCompiler,
    TableDefinition, UNBOUNDED_TYPES,
};
