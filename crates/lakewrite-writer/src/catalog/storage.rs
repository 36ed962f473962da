//! Catalog persisted as JSON documents in object storage
//!
//! Layout below the warehouse directory:
//!
//! ```text
//! _metastore/<schema>/_SCHEMA
//! _metastore/<schema>/<table>.json
//! ```
//!
//! The schema marker has no `.json` suffix, so no table document can take
//! its name.
//!
//! Writes are last-writer-wins; there is no locking between concurrent jobs.

use super::{Catalog, TableEntry, TableIdent};
use crate::error::{Result, WriterError};
use crate::storage::{Storage, TableLocation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const METASTORE_DIR: &str = "_metastore";
const SCHEMA_MARKER: &str = "_SCHEMA";

#[derive(Debug, Serialize, Deserialize)]
struct SchemaDocument {
    name: String,
    created_at_ms: i64,
}

pub struct StorageCatalog {
    name: String,
    storage: Storage,
    root: TableLocation,
}

impl StorageCatalog {
    pub fn new(name: impl Into<String>, storage: Storage, warehouse: &TableLocation) -> Self {
        Self {
            name: name.into(),
            storage,
            root: warehouse.join(METASTORE_DIR),
        }
    }

    fn schema_dir(&self, schema: &str) -> TableLocation {
        self.root.join(schema)
    }

    fn table_document(ident: &TableIdent) -> String {
        format!("{}.json", ident.name)
    }

    async fn schema_exists(&self, schema: &str) -> Result<bool> {
        Ok(self
            .storage
            .get(&self.schema_dir(schema), SCHEMA_MARKER)
            .await?
            .is_some())
    }

    async fn write_entry(&self, entry: &TableEntry) -> Result<()> {
        let body = serde_json::to_vec_pretty(entry).map_err(|e| {
            WriterError::table_operation(
                entry.ident.to_string(),
                format!("failed to serialize table entry: {}", e),
            )
        })?;
        self.storage
            .put(
                &self.schema_dir(&entry.ident.schema),
                &Self::table_document(&entry.ident),
                body,
            )
            .await
            .map_err(|e| WriterError::table_operation(entry.ident.to_string(), e.to_string()))
    }

    async fn require_schema(&self, ident: &TableIdent) -> Result<()> {
        if self.schema_exists(&ident.schema).await? {
            Ok(())
        } else {
            Err(WriterError::table_operation(
                ident.to_string(),
                format!("schema '{}' does not exist", ident.schema),
            ))
        }
    }
}

#[async_trait]
impl Catalog for StorageCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    fn endpoint(&self) -> String {
        self.root.to_string()
    }

    async fn ensure_schema(&self, schema: &str) -> Result<()> {
        if self.schema_exists(schema).await? {
            tracing::debug!("Schema '{}' already exists", schema);
            return Ok(());
        }

        let doc = SchemaDocument {
            name: schema.to_string(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        let body = serde_json::to_vec(&doc).map_err(|e| {
            WriterError::table_operation(schema.to_string(), format!("bad schema document: {}", e))
        })?;
        self.storage
            .put(&self.schema_dir(schema), SCHEMA_MARKER, body)
            .await?;
        tracing::info!("Created schema: {}", schema);
        Ok(())
    }

    async fn load_table(&self, ident: &TableIdent) -> Result<Option<TableEntry>> {
        let Some(body) = self
            .storage
            .get(&self.schema_dir(&ident.schema), &Self::table_document(ident))
            .await?
        else {
            return Ok(None);
        };

        let mut entry: TableEntry = serde_json::from_slice(&body).map_err(|e| {
            WriterError::table_operation(
                ident.to_string(),
                format!("corrupt catalog document: {}", e),
            )
        })?;
        entry.ident.catalog = self.name.clone();
        Ok(Some(entry))
    }

    async fn create_table(&self, entry: TableEntry) -> Result<()> {
        self.require_schema(&entry.ident).await?;
        if self.load_table(&entry.ident).await?.is_some() {
            return Err(WriterError::table_exists(entry.ident.to_string()));
        }
        self.write_entry(&entry).await
    }

    async fn replace_table(&self, entry: TableEntry) -> Result<()> {
        self.require_schema(&entry.ident).await?;
        self.write_entry(&entry).await
    }

    async fn drop_table(&self, ident: &TableIdent) -> Result<bool> {
        self.storage
            .delete(&self.schema_dir(&ident.schema), &Self::table_document(ident))
            .await
    }

    async fn list_tables(&self, schema: &str) -> Result<Vec<TableIdent>> {
        let names = self.storage.list(&self.schema_dir(schema)).await?;
        Ok(names
            .iter()
            .filter(|name| name.as_str() != SCHEMA_MARKER && !name.contains('/'))
            .filter_map(|name| name.strip_suffix(".json"))
            .map(|table| TableIdent::new(self.name.clone(), schema, table))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnEntry;
    use crate::error::ErrorCode;
    use opendal::Operator;

    fn catalog() -> (StorageCatalog, Storage) {
        let op = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let storage = Storage::from_operator(op);
        let warehouse = TableLocation::parse("s3a://bucket/warehouse").unwrap();
        (
            StorageCatalog::new("hive", storage.clone(), &warehouse),
            storage,
        )
    }

    fn entry(name: &str) -> TableEntry {
        TableEntry {
            ident: TableIdent::new("hive", "default", name),
            location: format!("s3a://bucket/default/{}", name),
            format: "parquet".to_string(),
            columns: vec![ColumnEntry {
                name: "id".to_string(),
                data_type: "int".to_string(),
                nullable: true,
            }],
            files: Vec::new(),
            properties: Default::default(),
            created_at_ms: 1,
            updated_at_ms: 1,
        }
    }

    #[tokio::test]
    async fn documents_live_under_metastore_dir() {
        let (catalog, storage) = catalog();
        assert_eq!(catalog.endpoint(), "s3a://bucket/warehouse/_metastore");

        catalog.ensure_schema("default").await.unwrap();
        catalog.create_table(entry("t")).await.unwrap();

        let dir = TableLocation::parse("s3a://bucket/warehouse/_metastore/default").unwrap();
        assert_eq!(
            storage.list(&dir).await.unwrap(),
            vec!["_SCHEMA".to_string(), "t.json".to_string()]
        );
    }

    #[tokio::test]
    async fn table_named_like_schema_marker() {
        let (catalog, _) = catalog();
        catalog.ensure_schema("default").await.unwrap();
        catalog.create_table(entry("_schema")).await.unwrap();

        let ident = TableIdent::new("hive", "default", "_schema");
        assert_eq!(
            catalog.load_table(&ident).await.unwrap(),
            Some(entry("_schema"))
        );
        assert_eq!(
            catalog.list_tables("default").await.unwrap(),
            vec![ident.clone()]
        );

        catalog.ensure_schema("default").await.unwrap();
        assert_eq!(
            catalog.load_table(&ident).await.unwrap(),
            Some(entry("_schema"))
        );
    }

    #[tokio::test]
    async fn create_replace_list_drop() {
        let (catalog, _) = catalog();
        assert_eq!(
            catalog.create_table(entry("t")).await.unwrap_err().code(),
            ErrorCode::E007TableOperation
        );

        catalog.ensure_schema("default").await.unwrap();
        catalog.create_table(entry("t")).await.unwrap();
        assert_eq!(
            catalog.create_table(entry("t")).await.unwrap_err().code(),
            ErrorCode::E002TableExists
        );

        let mut updated = entry("t");
        updated.updated_at_ms = 42;
        catalog.replace_table(updated.clone()).await.unwrap();
        catalog.create_table(entry("u")).await.unwrap();

        let ident = TableIdent::new("hive", "default", "t");
        assert_eq!(catalog.load_table(&ident).await.unwrap(), Some(updated));
        assert_eq!(
            catalog.list_tables("default").await.unwrap(),
            vec![ident.clone(), TableIdent::new("hive", "default", "u")]
        );

        assert!(catalog.drop_table(&ident).await.unwrap());
        assert!(catalog.load_table(&ident).await.unwrap().is_none());
        assert!(catalog.list_tables("missing").await.unwrap().is_empty());
    }
}
