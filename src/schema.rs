//! Table metadata and the schema converter cache
//!
//! The cache maps a table identity to an immutable snapshot of that table's
//! schema plus a positionally-indexed converter array. A refresh builds a
//! brand-new entry and swaps it in atomically, so concurrent readers never
//! observe a half-updated converter array paired with a mismatched schema.

use crate::convert::TypeConverter;
use crate::error::{BoxError, CdcError, Result};
use crate::event::Column;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Point-in-time snapshot of a table's declared columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Column names in declaration order
    pub column_names: Vec<String>,
    /// Declared database types, positionally matched to `column_names`
    pub column_types: Vec<String>,
}

impl TableSchema {
    /// Create a schema from parallel name/type lists.
    pub fn new(column_names: Vec<String>, column_types: Vec<String>) -> Self {
        Self {
            column_names,
            column_types,
        }
    }

    /// Create a schema from `(name, type)` pairs.
    pub fn from_columns<N, T>(columns: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        let (column_names, column_types) = columns
            .into_iter()
            .map(|(n, t)| (n.into(), t.into()))
            .unzip();
        Self {
            column_names,
            column_types,
        }
    }

    /// Number of declared columns.
    pub fn len(&self) -> usize {
        self.column_names.len()
    }

    /// Check for an empty schema.
    pub fn is_empty(&self) -> bool {
        self.column_names.is_empty()
    }

    /// Position of a column name in declaration order.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|n| n == name)
    }
}

/// Provider of current table metadata (a JDBC-style collaborator).
///
/// Injected into the [`ConverterCache`] at construction; the call is
/// synchronous from the affected table's point of view and any timeout is the
/// provider's responsibility.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch the current column names and declared types for a table.
    async fn table_metadata(
        &self,
        schema: &str,
        table: &str,
    ) -> std::result::Result<TableSchema, BoxError>;
}

/// One cached converter pipeline for a table.
///
/// Immutable after construction; replaced as a unit on refresh.
#[derive(Debug)]
pub struct CacheEntry {
    /// The schema snapshot the converters were built from
    pub schema: TableSchema,
    /// Converters positionally indexed to `schema.column_names`
    pub converters: Vec<TypeConverter>,
}

impl CacheEntry {
    fn build(table: &str, schema: TableSchema) -> Result<Self> {
        // Mismatched parallel lists would desync converter indices from
        // column positions, so they are rejected before install.
        if schema.column_names.len() != schema.column_types.len() {
            return Err(CdcError::metadata_fetch(
                table,
                format!(
                    "metadata reports {} column names but {} column types",
                    schema.column_names.len(),
                    schema.column_types.len()
                )
                .into(),
            ));
        }
        let converters = schema
            .column_types
            .iter()
            .map(|ty| TypeConverter::for_declared_type(ty))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { schema, converters })
    }

    /// Check whether an incoming column set still matches this entry:
    /// same column count and every incoming name known to the schema.
    fn matches(&self, incoming: &[Column]) -> bool {
        incoming.len() == self.converters.len()
            && incoming
                .iter()
                .all(|column| self.schema.column_index(&column.name).is_some())
    }
}

/// Read-mostly cache of per-table converter pipelines.
///
/// Shared across all tables' dispatch workers. A detected drift (column count
/// or names no longer matching) triggers a full refresh from the metadata
/// provider; the refresh blocks only the worker for the affected table.
pub struct ConverterCache {
    provider: Arc<dyn MetadataProvider>,
    entries: DashMap<String, Arc<CacheEntry>>,
}

impl ConverterCache {
    /// Create a cache backed by the given metadata provider.
    pub fn new(provider: Arc<dyn MetadataProvider>) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
        }
    }

    /// Resolve the converter pipeline for a table.
    ///
    /// Returns the cached entry when the incoming column set still matches;
    /// otherwise refreshes from the metadata provider first. Fails only by
    /// propagating a metadata-provider or unsupported-type error.
    pub async fn resolve(
        &self,
        schema: &str,
        table: &str,
        incoming: &[Column],
    ) -> Result<Arc<CacheEntry>> {
        let key = table_key(schema, table);
        if let Some(entry) = self.entries.get(&key) {
            if entry.matches(incoming) {
                return Ok(Arc::clone(entry.value()));
            }
            debug!(table = %key, "converter drift detected, refreshing table metadata");
        }
        self.refresh(schema, table).await
    }

    /// Force a refresh of a table's cached schema and converters.
    ///
    /// Used by the DDL handler after a schema change event; the new entry is
    /// installed as a unit.
    pub async fn refresh(&self, schema: &str, table: &str) -> Result<Arc<CacheEntry>> {
        let key = table_key(schema, table);
        let metadata = self
            .provider
            .table_metadata(schema, table)
            .await
            .map_err(|source| CdcError::metadata_fetch(&key, source))?;

        debug!(
            table = %key,
            columns = metadata.len(),
            "rebuilding converter pipeline from table metadata"
        );

        let entry = Arc::new(CacheEntry::build(&key, metadata)?);
        self.entries.insert(key, entry.clone());
        Ok(entry)
    }

    /// Number of cached tables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check for an empty cache.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn table_key(schema: &str, table: &str) -> String {
    format!("{schema}.{table}")
}

/// Simple in-memory metadata provider for testing.
#[derive(Debug, Default)]
pub struct MemoryMetadataProvider {
    tables: DashMap<String, TableSchema>,
}

impl MemoryMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a table's metadata.
    pub fn set_table(&self, schema: &str, table: &str, metadata: TableSchema) {
        self.tables.insert(table_key(schema, table), metadata);
    }
}

#[async_trait]
impl MetadataProvider for MemoryMetadataProvider {
    async fn table_metadata(
        &self,
        schema: &str,
        table: &str,
    ) -> std::result::Result<TableSchema, BoxError> {
        let key = table_key(schema, table);
        self.tables
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| format!("unknown table {key}").into())
    }
}
