//! Table catalogs
//!
//! A catalog maps `<catalog>.<schema>.<table>` identifiers to a storage
//! location, a column list and the data files written for the table.

use crate::error::{Result, WriterError};
use crate::storage::{Storage, TableLocation};
use arrow::datatypes::{DataType, Schema};
use async_trait::async_trait;
use lakewrite_config::{CatalogBackend, CatalogConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

mod memory;
mod rest;
mod storage;

pub use memory::MemoryCatalog;
pub use rest::RestCatalog;
pub use storage::StorageCatalog;

/// Schema used when an identifier omits it
pub const DEFAULT_SCHEMA: &str = "default";

/// Fully-qualified table identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableIdent {
    pub catalog: String,
    pub schema: String,
    pub name: String,
}

impl TableIdent {
    pub fn new(
        catalog: impl Into<String>,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Parse `table`, `schema.table` or `catalog.schema.table`.
    ///
    /// Missing parts default to `default_catalog` and [`DEFAULT_SCHEMA`].
    /// Schema and table names are lower-cased the way a Hive metastore
    /// stores them.
    pub fn parse(input: &str, default_catalog: &str) -> Result<Self> {
        let parts: Vec<&str> = input.trim().split('.').collect();
        for part in &parts {
            if part.is_empty()
                || !part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
            {
                return Err(WriterError::invalid_config(format!(
                    "Invalid table identifier '{}': each part must be non-empty and use only ASCII letters, digits and '_'",
                    input
                )));
            }
        }

        let (catalog, schema, name) = match parts.as_slice() {
            [name] => (default_catalog, DEFAULT_SCHEMA, *name),
            [schema, name] => (default_catalog, *schema, *name),
            [catalog, schema, name] => (*catalog, *schema, *name),
            _ => {
                return Err(WriterError::invalid_config(format!(
                    "Invalid table identifier '{}': expected at most catalog.schema.table",
                    input
                )))
            }
        };

        Ok(Self::new(
            catalog,
            schema.to_lowercase(),
            name.to_lowercase(),
        ))
    }
}

impl std::fmt::Display for TableIdent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.catalog, self.schema, self.name)
    }
}

/// Column as recorded in the catalog, typed with Hive type names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnEntry {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// One data file belonging to a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFileEntry {
    /// Full location of the file
    pub path: String,
    pub rows: usize,
    pub bytes: u64,
    /// Hex blake3 hash of the file contents
    pub content_hash: String,
}

/// Catalog record for a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableEntry {
    pub ident: TableIdent,
    pub location: String,
    pub format: String,
    pub columns: Vec<ColumnEntry>,
    #[serde(default)]
    pub files: Vec<DataFileEntry>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    pub created_at_ms: i64,
    pub updated_at_ms: i64,
}

impl TableEntry {
    /// Total rows across all registered data files
    pub fn row_count(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

fn hive_type_name(data_type: &DataType) -> Option<&'static str> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => Some("string"),
        DataType::Boolean => Some("boolean"),
        DataType::Int8 => Some("tinyint"),
        DataType::Int16 => Some("smallint"),
        DataType::Int32 => Some("int"),
        DataType::Int64 => Some("bigint"),
        DataType::Float32 => Some("float"),
        DataType::Float64 => Some("double"),
        DataType::Date32 => Some("date"),
        DataType::Binary | DataType::LargeBinary => Some("binary"),
        _ => None,
    }
}

/// Map an Arrow schema to catalog columns
pub fn columns_from_schema(schema: &Schema) -> Result<Vec<ColumnEntry>> {
    schema
        .fields()
        .iter()
        .map(|field| {
            let data_type = hive_type_name(field.data_type()).ok_or_else(|| {
                WriterError::invalid_data(format!(
                    "Column '{}' has type {} which cannot be registered in the catalog",
                    field.name(),
                    field.data_type()
                ))
            })?;
            Ok(ColumnEntry {
                name: field.name().to_lowercase(),
                data_type: data_type.to_string(),
                nullable: field.is_nullable(),
            })
        })
        .collect()
}

/// Metadata catalog operations used by the table writer
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Catalog name, the first part of qualified identifiers
    fn name(&self) -> &str;

    /// Where the catalog lives, for diagnostics
    fn endpoint(&self) -> String;

    /// Create the schema if it does not exist yet
    async fn ensure_schema(&self, schema: &str) -> Result<()>;

    async fn load_table(&self, ident: &TableIdent) -> Result<Option<TableEntry>>;

    /// Register a new table; fails with `TableExists` if already registered
    async fn create_table(&self, entry: TableEntry) -> Result<()>;

    /// Register or replace a table
    async fn replace_table(&self, entry: TableEntry) -> Result<()>;

    /// Remove a table registration; `false` when it did not exist
    async fn drop_table(&self, ident: &TableIdent) -> Result<bool>;

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableIdent>>;
}

/// Initialize a catalog based on configuration
///
/// The storage catalog keeps its documents under `<warehouse_dir>/_metastore`
/// in `storage`. The REST catalog is contacted before it is returned, so an
/// unreachable metastore fails here rather than at write time.
pub async fn initialize_catalog(
    config: &CatalogConfig,
    name: &str,
    storage: &Storage,
    warehouse_dir: &str,
) -> Result<Arc<dyn Catalog>> {
    match config.backend {
        CatalogBackend::Memory => {
            tracing::debug!("Initializing in-memory catalog '{}'", name);
            Ok(Arc::new(MemoryCatalog::new(name)))
        }
        CatalogBackend::Storage => {
            let warehouse = TableLocation::parse(warehouse_dir)?;
            let catalog = StorageCatalog::new(name, storage.clone(), &warehouse);
            tracing::debug!("Initializing storage catalog at {}", catalog.endpoint());
            Ok(Arc::new(catalog))
        }
        CatalogBackend::Rest => {
            let uri = config.uri.as_deref().ok_or_else(|| {
                WriterError::invalid_config("rest catalog backend requires catalog.uri".to_string())
            })?;
            let catalog =
                RestCatalog::connect(name, uri, config.token.clone(), config.timeout()).await?;
            Ok(Arc::new(catalog))
        }
    }
}
