//! Per-target memo of compiled schemas.
//!
//! Entries never expire. A schema change in the database is only picked up
//! after [`SchemaCache::invalidate`] or [`SchemaCache::clear`]. Concurrent
//! misses for the same target each run their own introspection; the last
//! one to finish wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::compiler::{CompiledSchema, SchemaCompiler};
use crate::db::{CatalogSource, ConnectionTarget};
use crate::error::{AssistError, AssistResult};

/// SHA-256 of the value's JSON serialization, as lowercase hex.
pub fn compute_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Cache key for a target: every identity field, credentials included.
pub fn cache_key(target: &ConnectionTarget) -> AssistResult<String> {
    compute_hash(target).map_err(|e| AssistError::io(e).context("Failed to build schema cache key"))
}

pub struct SchemaCache {
    catalog: Arc<dyn CatalogSource>,
    compiler: SchemaCompiler,
    entries: Mutex<HashMap<String, CompiledSchema>>,
}

impl SchemaCache {
    pub fn new(catalog: Arc<dyn CatalogSource>) -> Self {
        Self {
            catalog,
            compiler: SchemaCompiler::new(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CompiledSchema>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn get_schema(&self, target: &ConnectionTarget) -> AssistResult<CompiledSchema> {
        let key = cache_key(target)?;

        let cached = self.entries().get(&key).cloned();
        if let Some(schema) = cached {
            tracing::debug!("Schema cache hit for {}/{}", target.host, target.database);
            return Ok(schema);
        }

        tracing::debug!("Schema cache miss for {}/{}", target.host, target.database);
        let rows = self
            .catalog
            .fetch_columns(target)
            .await
            .map_err(|e| e.context("Error getting database schema"))?;

        let schema = self.compiler.compile(&rows);
        self.entries().insert(key, schema.clone());
        Ok(schema)
    }

    /// Drop the entry for `target`; returns whether one existed.
    pub fn invalidate(&self, target: &ConnectionTarget) -> AssistResult<bool> {
        let key = cache_key(target)?;
        Ok(self.entries().remove(&key).is_some())
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}
