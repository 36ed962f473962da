//! Processing session lifecycle
//!
//! A [`Session`] owns the storage handle and the catalog for one job. It is
//! released exactly once, either by [`Session::stop`] or when dropped.

use crate::catalog::{initialize_catalog, Catalog, MemoryCatalog, TableIdent};
use crate::dataframe::{rows_to_batch, DataFrame, Row};
use crate::encoding::set_parquet_row_group_size;
use crate::error::{Result, WriterError};
use crate::storage::{Storage, TableLocation};
use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use lakewrite_config::{CatalogConfig, Compression, JobConfig, StorageConfig};
use opendal::Operator;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const CONF_APP_NAME: &str = "app.name";
pub const CONF_METASTORE_URIS: &str = "catalog.metastore.uris";
pub const CONF_WAREHOUSE_DIR: &str = "sql.warehouse.dir";
pub const CONF_CATALOG_IMPLEMENTATION: &str = "sql.catalog.implementation";
pub const CONF_PARQUET_COMPRESSION: &str = "sql.parquet.compression.codec";

const DEFAULT_APP_NAME: &str = "lakewrite";

/// Read-only view of the session configuration
#[derive(Debug, Clone, Default)]
pub struct RuntimeConf {
    entries: BTreeMap<String, String>,
}

impl RuntimeConf {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

pub(crate) struct SessionInner {
    pub(crate) app_name: String,
    pub(crate) storage: Storage,
    pub(crate) catalog: Arc<dyn Catalog>,
    pub(crate) warehouse: TableLocation,
    pub(crate) conf: RuntimeConf,
    stopped: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
}

impl SessionInner {
    pub(crate) fn ensure_active(&self) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            Err(WriterError::session_closed(self.app_name.clone()))
        } else {
            Ok(())
        }
    }

    /// Default codec for writes without a `compression` option
    pub(crate) fn default_compression(&self) -> Result<Compression> {
        match self.conf.get(CONF_PARQUET_COMPRESSION) {
            Some(codec) => codec.parse().map_err(|e: anyhow::Error| {
                WriterError::invalid_config(format!("{}: {}", CONF_PARQUET_COMPRESSION, e))
            }),
            None => Ok(Compression::default()),
        }
    }

    fn release(&self) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.releases.fetch_add(1, Ordering::SeqCst);
        true
    }
}

/// Observes whether a session has been released
#[derive(Debug, Clone)]
pub struct ReleaseHandle {
    stopped: Arc<AtomicBool>,
    releases: Arc<AtomicUsize>,
}

impl ReleaseHandle {
    pub fn is_released(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn release_count(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    app_name: Option<String>,
    catalog_support: bool,
    catalog_name: String,
    warehouse_dir: String,
    storage: StorageConfig,
    catalog_config: CatalogConfig,
    conf: BTreeMap<String, String>,
    operator: Option<Operator>,
    catalog: Option<Arc<dyn Catalog>>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::from_config(&JobConfig::default())
    }
}

impl SessionBuilder {
    /// Storage, catalog and warehouse settings from a job configuration.
    ///
    /// The application name and catalog support are left to the caller.
    pub fn from_config(config: &JobConfig) -> Self {
        let mut conf = BTreeMap::new();
        conf.insert(
            CONF_PARQUET_COMPRESSION.to_string(),
            config.write.compression.to_string(),
        );

        Self {
            app_name: None,
            catalog_support: false,
            catalog_name: config.table.catalog.clone(),
            warehouse_dir: config.warehouse_dir(),
            storage: config.storage.clone(),
            catalog_config: config.catalog.clone(),
            conf,
            operator: None,
            catalog: None,
        }
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Register tables in the configured catalog instead of a session-local one
    pub fn enable_catalog_support(mut self) -> Self {
        self.catalog_support = true;
        self
    }

    /// Set a session configuration entry
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conf.insert(key.into(), value.into());
        self
    }

    /// Use an existing OpenDAL operator instead of the configured storage backend
    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    /// Use an existing catalog instead of the configured backend
    pub fn with_catalog(mut self, catalog: Arc<dyn Catalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Acquire the session: storage first, then the catalog
    pub async fn get_or_create(self) -> Result<Session> {
        let app_name = self
            .app_name
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
        if app_name.trim().is_empty() {
            return Err(WriterError::invalid_config(
                "application name must not be empty".to_string(),
            ));
        }

        set_parquet_row_group_size(self.storage.parquet_row_group_size);

        let storage = match self.operator {
            Some(operator) => Storage::from_operator(operator),
            None => Storage::from_config(&self.storage)?,
        };

        let mut conf = self.conf;
        let warehouse_dir = conf
            .get(CONF_WAREHOUSE_DIR)
            .cloned()
            .unwrap_or(self.warehouse_dir);
        let warehouse = TableLocation::parse(&warehouse_dir)?;

        let catalog: Arc<dyn Catalog> = match (self.catalog, self.catalog_support) {
            (Some(catalog), _) => catalog,
            (None, true) => {
                initialize_catalog(
                    &self.catalog_config,
                    &self.catalog_name,
                    &storage,
                    &warehouse_dir,
                )
                .await?
            }
            (None, false) => Arc::new(MemoryCatalog::new(self.catalog_name.clone())),
        };

        conf.insert(CONF_APP_NAME.to_string(), app_name.clone());
        conf.insert(CONF_METASTORE_URIS.to_string(), catalog.endpoint());
        conf.insert(CONF_WAREHOUSE_DIR.to_string(), warehouse.to_string());
        conf.insert(
            CONF_CATALOG_IMPLEMENTATION.to_string(),
            if self.catalog_support {
                "hive".to_string()
            } else {
                "in-memory".to_string()
            },
        );

        info!(
            "Session '{}' started (storage: {}, catalog: {} at {})",
            app_name,
            storage.describe(),
            catalog.name(),
            catalog.endpoint()
        );

        Ok(Session {
            inner: Arc::new(SessionInner {
                app_name,
                storage,
                catalog,
                warehouse,
                conf: RuntimeConf { entries: conf },
                stopped: Arc::new(AtomicBool::new(false)),
                releases: Arc::new(AtomicUsize::new(0)),
            }),
        })
    }
}

/// An acquired processing session
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn app_name(&self) -> &str {
        &self.inner.app_name
    }

    pub fn conf(&self) -> &RuntimeConf {
        &self.inner.conf
    }

    pub fn catalog(&self) -> Arc<dyn Catalog> {
        self.inner.catalog.clone()
    }

    pub fn storage(&self) -> &Storage {
        &self.inner.storage
    }

    pub fn release_handle(&self) -> ReleaseHandle {
        ReleaseHandle {
            stopped: self.inner.stopped.clone(),
            releases: self.inner.releases.clone(),
        }
    }

    /// Build a dataframe from literal rows against an explicit schema
    pub fn create_dataframe(&self, rows: Vec<Row>, schema: SchemaRef) -> Result<DataFrame> {
        self.inner.ensure_active()?;
        let batch = rows_to_batch(&rows, &schema)?;
        Ok(DataFrame::new(self.inner.clone(), schema, vec![batch]))
    }

    /// Read every Parquet file below a location
    pub async fn read_parquet(&self, location: &str) -> Result<DataFrame> {
        self.inner.ensure_active()?;
        let location = TableLocation::parse(location)?;
        let names = self.inner.storage.list(&location).await?;

        let mut paths = Vec::new();
        for name in names.iter().filter(|n| n.ends_with(".parquet")) {
            paths.push(location.join(name));
        }
        self.read_files(&paths).await
    }

    /// Read the data files registered for a table
    pub async fn read_table(&self, name: &str) -> Result<DataFrame> {
        self.inner.ensure_active()?;
        let ident = TableIdent::parse(name, self.inner.catalog.name())?;
        let entry = self
            .inner
            .catalog
            .load_table(&ident)
            .await?
            .ok_or_else(|| {
                WriterError::table_operation(ident.to_string(), "table not found".to_string())
            })?;

        let paths = entry
            .files
            .iter()
            .map(|file| TableLocation::parse(&file.path))
            .collect::<Result<Vec<_>>>()?;
        self.read_files(&paths).await
    }

    async fn read_files(&self, paths: &[TableLocation]) -> Result<DataFrame> {
        let mut schema: Option<SchemaRef> = None;
        let mut batches: Vec<RecordBatch> = Vec::new();

        for path in paths {
            let bytes = self
                .inner
                .storage
                .get(&path.root(), path.key())
                .await?
                .ok_or_else(|| {
                    WriterError::table_operation(
                        path.to_string(),
                        "data file is missing".to_string(),
                    )
                })?;

            let reader = ParquetRecordBatchReaderBuilder::try_new(bytes)
                .and_then(|builder| {
                    schema.get_or_insert_with(|| builder.schema().clone());
                    builder.build()
                })
                .map_err(|e| {
                    WriterError::invalid_data(format!("failed to open '{}': {}", path, e))
                })?;

            for batch in reader {
                batches.push(batch.map_err(|e| {
                    WriterError::invalid_data(format!("failed to decode '{}': {}", path, e))
                })?);
            }
        }

        debug!("Read {} batches from {} files", batches.len(), paths.len());
        let schema = schema.unwrap_or_else(|| Arc::new(Schema::empty()));
        Ok(DataFrame::new(self.inner.clone(), schema, batches))
    }

    /// Release the session
    pub fn stop(self) {
        if self.inner.release() {
            info!("Session '{}' stopped", self.inner.app_name);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.inner.release() {
            warn!(
                "Session '{}' dropped without stop(); released on drop",
                self.inner.app_name
            );
        }
    }
}
