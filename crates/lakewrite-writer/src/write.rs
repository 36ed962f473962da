//! Dataframe writer: Parquet files plus catalog registration

use crate::catalog::{columns_from_schema, DataFileEntry, TableEntry, TableIdent, DEFAULT_SCHEMA};
use crate::dataframe::DataFrame;
use crate::encoding::{encode_batches, file_suffix};
use crate::error::{Result, WriterError};
use crate::session::SessionInner;
use crate::storage::TableLocation;
use lakewrite_config::{Compression, SaveMode};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub const OPTION_PATH: &str = "path";
pub const OPTION_COMPRESSION: &str = "compression";

const SUCCESS_MARKER: &str = "_SUCCESS";
const SUPPORTED_FORMAT: &str = "parquet";
const TABLE_TYPE: &str = "table_type";
const TABLE_TYPE_MANAGED: &str = "MANAGED";
const TABLE_TYPE_EXTERNAL: &str = "EXTERNAL";

/// Outcome of a write
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    /// Registered table, `None` for path-only writes
    pub table: Option<TableIdent>,
    pub location: String,
    pub mode: SaveMode,
    pub rows_written: usize,
    pub files: Vec<DataFileEntry>,
    /// The target existed and the mode was `Ignore`
    pub skipped: bool,
}

impl WriteSummary {
    fn skipped(table: Option<TableIdent>, location: &TableLocation, mode: SaveMode) -> Self {
        Self {
            table,
            location: location.to_string(),
            mode,
            rows_written: 0,
            files: Vec::new(),
            skipped: true,
        }
    }
}

/// Location of a managed table below the warehouse
pub fn managed_location(warehouse: &TableLocation, ident: &TableIdent) -> TableLocation {
    if ident.schema == DEFAULT_SCHEMA {
        warehouse.join(&ident.name)
    } else {
        warehouse.join(&format!("{}.db/{}", ident.schema, ident.name))
    }
}

/// Builder returned by [`DataFrame::write`]
pub struct DataFrameWriter<'a> {
    df: &'a DataFrame,
    format: String,
    mode: SaveMode,
    options: BTreeMap<String, String>,
}

impl<'a> DataFrameWriter<'a> {
    pub(crate) fn new(df: &'a DataFrame) -> Self {
        Self {
            df,
            format: SUPPORTED_FORMAT.to_string(),
            mode: SaveMode::default(),
            options: BTreeMap::new(),
        }
    }

    pub fn format(mut self, format: &str) -> Self {
        self.format = format.to_string();
        self
    }

    pub fn mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set a writer option. `path` and `compression` are recognized.
    pub fn option(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = key.to_lowercase();
        if key != OPTION_PATH && key != OPTION_COMPRESSION {
            warn!("Ignoring unsupported writer option '{}'", key);
            return self;
        }
        self.options.insert(key, value.into());
        self
    }

    fn session(&self) -> &SessionInner {
        self.df.session()
    }

    fn check_format(&self) -> Result<()> {
        if self.format.eq_ignore_ascii_case(SUPPORTED_FORMAT) {
            Ok(())
        } else {
            Err(WriterError::unsupported_format(self.format.clone()))
        }
    }

    fn compression(&self) -> Result<Compression> {
        match self.options.get(OPTION_COMPRESSION) {
            Some(codec) => codec.parse().map_err(|e: anyhow::Error| {
                WriterError::invalid_config(format!("option '{}': {}", OPTION_COMPRESSION, e))
            }),
            None => self.session().default_compression(),
        }
    }

    /// Write one data file and the success marker below `location`
    async fn write_data_file(
        &self,
        location: &TableLocation,
        codec: Compression,
    ) -> Result<DataFileEntry> {
        let session = self.session();
        let encoded = encode_batches(
            self.df.schema(),
            self.df.batches(),
            codec,
            &session.app_name,
        )?;

        let name = format!("part-00000-{}-c000.{}", Uuid::new_v4(), file_suffix(codec));
        let size = encoded.bytes.len() as u64;
        session.storage.put(location, &name, encoded.bytes).await?;
        session
            .storage
            .put(location, SUCCESS_MARKER, Vec::new())
            .await?;

        let path = location.join(&name).to_string();
        debug!(
            "Wrote {} rows ({} bytes, blake3 {}) to {}",
            encoded.rows, size, encoded.content_hash, path
        );

        Ok(DataFileEntry {
            path,
            rows: encoded.rows,
            bytes: size,
            content_hash: encoded.content_hash,
        })
    }

    /// Write the dataframe and register it as `name` in the session catalog
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn save_as_table(self, name: &str) -> Result<WriteSummary> {
        let session = self.session();
        session.ensure_active()?;
        self.check_format()?;

        let catalog = session.catalog.clone();
        let ident = TableIdent::parse(name, catalog.name())?;
        if ident.catalog != catalog.name() {
            return Err(WriterError::invalid_config(format!(
                "Table '{}' names catalog '{}' but the session catalog is '{}'",
                ident,
                ident.catalog,
                catalog.name()
            )));
        }

        let external = self.options.contains_key(OPTION_PATH);
        let location = match self.options.get(OPTION_PATH) {
            Some(path) => TableLocation::parse(path)?,
            None => managed_location(&session.warehouse, &ident),
        };
        let columns = columns_from_schema(&self.df.schema())?;
        let codec = self.compression()?;

        catalog.ensure_schema(&ident.schema).await?;
        let existing = catalog.load_table(&ident).await?;
        let now = chrono::Utc::now().timestamp_millis();

        match (self.mode, existing) {
            (SaveMode::ErrorIfExists, Some(_)) => Err(WriterError::table_exists(ident.to_string())),
            (SaveMode::Ignore, Some(_)) => {
                info!("Table '{}' exists, skipping write (mode=ignore)", ident);
                Ok(WriteSummary::skipped(Some(ident), &location, self.mode))
            }
            (SaveMode::Append, Some(mut entry)) => {
                if entry.columns != columns {
                    return Err(WriterError::schema_incompatible(
                        ident.to_string(),
                        format!(
                            "registered columns {:?} do not match dataframe columns {:?}",
                            entry.columns, columns
                        ),
                    ));
                }
                if entry.location != location.to_string() {
                    return Err(WriterError::schema_incompatible(
                        ident.to_string(),
                        format!(
                            "table is stored at '{}', not '{}'",
                            entry.location, location
                        ),
                    ));
                }

                let file = self.write_data_file(&location, codec).await?;
                entry.files.push(file.clone());
                entry.updated_at_ms = now;
                catalog.replace_table(entry).await?;

                info!("Appended {} rows to table '{}'", file.rows, ident);
                Ok(WriteSummary {
                    table: Some(ident),
                    location: location.to_string(),
                    mode: self.mode,
                    rows_written: file.rows,
                    files: vec![file],
                    skipped: false,
                })
            }
            (mode, existing) => {
                if mode == SaveMode::Overwrite {
                    let removed = session.storage.clear(&location).await?;
                    if removed > 0 {
                        info!("Removed {} existing objects under {}", removed, location);
                    }
                }

                let file = self.write_data_file(&location, codec).await?;

                let mut properties = BTreeMap::new();
                properties.insert("provider".to_string(), SUPPORTED_FORMAT.to_string());
                properties.insert("compression".to_string(), codec.to_string());
                properties.insert("created_by".to_string(), session.app_name.clone());
                properties.insert(
                    TABLE_TYPE.to_string(),
                    if external {
                        TABLE_TYPE_EXTERNAL
                    } else {
                        TABLE_TYPE_MANAGED
                    }
                    .to_string(),
                );

                let entry = TableEntry {
                    ident: ident.clone(),
                    location: location.to_string(),
                    format: SUPPORTED_FORMAT.to_string(),
                    columns,
                    files: vec![file.clone()],
                    properties,
                    created_at_ms: now,
                    updated_at_ms: now,
                };

                // Managed data left at a previous location is owned by nobody once replaced
                let abandoned = existing
                    .as_ref()
                    .filter(|previous| {
                        mode == SaveMode::Overwrite
                            && previous.location != entry.location
                            && previous.properties.get(TABLE_TYPE).map(String::as_str)
                                == Some(TABLE_TYPE_MANAGED)
                    })
                    .map(|previous| TableLocation::parse(&previous.location))
                    .transpose()?;

                if existing.is_some() || mode == SaveMode::Overwrite {
                    catalog.replace_table(entry).await?;
                } else {
                    catalog.create_table(entry).await?;
                }

                if let Some(previous) = abandoned {
                    let removed = session.storage.clear(&previous).await?;
                    info!(
                        "Removed {} objects from previous managed location {}",
                        removed, previous
                    );
                }

                info!(
                    "Registered table '{}' at {} ({} rows)",
                    ident, location, file.rows
                );
                Ok(WriteSummary {
                    table: Some(ident),
                    location: location.to_string(),
                    mode,
                    rows_written: file.rows,
                    files: vec![file],
                    skipped: false,
                })
            }
        }
    }

    /// Write the dataframe to `path` without touching the catalog
    #[instrument(skip(self), fields(mode = %self.mode))]
    pub async fn save(self, path: &str) -> Result<WriteSummary> {
        let session = self.session();
        session.ensure_active()?;
        self.check_format()?;

        let location = TableLocation::parse(path)?;
        let codec = self.compression()?;

        if session.storage.has_objects(&location).await? {
            match self.mode {
                SaveMode::ErrorIfExists => {
                    return Err(WriterError::write_failure(format!(
                        "Path '{}' already exists",
                        location
                    )))
                }
                SaveMode::Ignore => {
                    info!("Path '{}' exists, skipping write (mode=ignore)", location);
                    return Ok(WriteSummary::skipped(None, &location, self.mode));
                }
                SaveMode::Overwrite => {
                    session.storage.clear(&location).await?;
                }
                SaveMode::Append => {}
            }
        }

        let file = self.write_data_file(&location, codec).await?;
        info!("Saved {} rows to {}", file.rows, location);
        Ok(WriteSummary {
            table: None,
            location: location.to_string(),
            mode: self.mode,
            rows_written: file.rows,
            files: vec![file],
            skipped: false,
        })
    }
}
