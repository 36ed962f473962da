// lakewrite-config - Job configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority, S3_BUCKET_NAME and LAKEWRITE_*)
// 2. Config file path from LAKEWRITE_CONFIG env var
// 3. Config file contents from LAKEWRITE_CONFIG_CONTENT env var
// 4. Default config file location (./lakewrite.toml)
// 5. Built-in defaults (lowest priority)
//
// Everything is resolved once at startup into a `JobConfig` which is then
// passed to the runner explicitly.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{apply_env_overrides, EnvSource, MapEnvSource, BUCKET_ENV, ENV_PREFIX};
pub use sources::StdEnvSource;

/// Resolved configuration for one job run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub table: TableConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub write: WriteConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Target table naming
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Object storage bucket holding the table data
    pub bucket: String,
    /// Catalog schema (database) the table is registered under
    pub schema: String,
    /// Table name
    pub name: String,
    /// Catalog name used as the first part of the qualified identifier
    pub catalog: String,
    /// URL scheme of the table location
    pub scheme: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            bucket: "spark-data".to_string(),
            schema: "default".to_string(),
            name: "test_spark_table".to_string(),
            catalog: "hive".to_string(),
            scheme: "s3a".to_string(),
        }
    }
}

/// Processing session settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub app_name: String,
    /// Register tables in the configured catalog. When disabled the session
    /// keeps table registrations in memory only.
    pub catalog_support: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: "SparkWriteTestToMinioHive".to_string(),
            catalog_support: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    /// Table documents stored next to the data in the object store
    Storage,
    /// HTTP metastore
    Rest,
    /// Process-local, lost when the job exits
    Memory,
}

impl std::fmt::Display for CatalogBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogBackend::Storage => write!(f, "storage"),
            CatalogBackend::Rest => write!(f, "rest"),
            CatalogBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for CatalogBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "storage" | "file" => Ok(CatalogBackend::Storage),
            "rest" | "http" => Ok(CatalogBackend::Rest),
            "memory" | "in-memory" => Ok(CatalogBackend::Memory),
            _ => anyhow::bail!(
                "Unsupported catalog backend: {}. Supported: storage, rest, memory",
                s
            ),
        }
    }
}

/// Metadata catalog settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub backend: CatalogBackend,
    /// Metastore endpoint (required for the rest backend)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Bearer token for the rest backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Root for managed tables and storage-catalog documents
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_dir: Option<String>,
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            backend: CatalogBackend::Storage,
            uri: None,
            token: None,
            warehouse_dir: None,
            timeout_secs: 30,
        }
    }
}

impl CatalogConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Storage backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_backend")]
    pub backend: StorageBackend,
    #[serde(default = "default_parquet_row_group_size")]
    pub parquet_row_group_size: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            parquet_row_group_size: default_parquet_row_group_size(),
            fs: None,
            s3: Some(S3Config::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Fs,
    Memory,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::Memory => write!(f, "memory"),
        }
    }
}

fn default_storage_backend() -> StorageBackend {
    StorageBackend::S3
}

fn default_parquet_row_group_size() -> usize {
    32 * 1024
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "s3" | "aws" | "minio" => Ok(StorageBackend::S3),
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "memory" => Ok(StorageBackend::Memory),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: s3, fs, memory", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
        }
    }
}

/// What happens when the target table or path already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    Append,
    Overwrite,
    #[default]
    ErrorIfExists,
    Ignore,
}

impl std::fmt::Display for SaveMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveMode::Append => write!(f, "append"),
            SaveMode::Overwrite => write!(f, "overwrite"),
            SaveMode::ErrorIfExists => write!(f, "errorifexists"),
            SaveMode::Ignore => write!(f, "ignore"),
        }
    }
}

impl std::str::FromStr for SaveMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "append" => Ok(SaveMode::Append),
            "overwrite" => Ok(SaveMode::Overwrite),
            "error" | "errorifexists" | "error_if_exists" | "default" => {
                Ok(SaveMode::ErrorIfExists)
            }
            "ignore" => Ok(SaveMode::Ignore),
            _ => anyhow::bail!(
                "Unsupported save mode: {}. Supported: append, overwrite, errorifexists, ignore",
                s
            ),
        }
    }
}

/// Parquet compression codec
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Snappy,
    Zstd,
    Uncompressed,
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::Snappy => write!(f, "snappy"),
            Compression::Zstd => write!(f, "zstd"),
            Compression::Uncompressed => write!(f, "uncompressed"),
        }
    }
}

impl std::str::FromStr for Compression {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "none" | "uncompressed" => Ok(Compression::Uncompressed),
            _ => anyhow::bail!(
                "Unsupported compression: {}. Supported: snappy, zstd, uncompressed",
                s
            ),
        }
    }
}

/// Write step settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteConfig {
    pub mode: SaveMode,
    /// Return a fatal error when the write fails instead of only logging it
    pub fail_on_error: bool,
    pub compression: Compression,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            mode: SaveMode::Overwrite,
            fail_on_error: false,
            compression: Compression::Snappy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl JobConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config(&StdEnvSource)
    }

    /// Load configuration from an explicit file, then apply env overrides
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path, &StdEnvSource)
    }

    /// Load configuration reading the environment through `env`
    pub fn load_with_env<E: EnvSource>(env: &E) -> Result<Self> {
        sources::load_config(env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Object storage location of the table data: `<scheme>://<bucket>/<schema>/<table>`
    pub fn table_location(&self) -> String {
        format!(
            "{}://{}/{}/{}",
            self.table.scheme, self.table.bucket, self.table.schema, self.table.name
        )
    }

    /// Fully-qualified catalog identifier: `<catalog>.<schema>.<table>`
    pub fn qualified_table_name(&self) -> String {
        format!(
            "{}.{}.{}",
            self.table.catalog, self.table.schema, self.table.name
        )
    }

    /// Warehouse root, defaulting to `<scheme>://<bucket>/warehouse`
    pub fn warehouse_dir(&self) -> String {
        self.catalog
            .warehouse_dir
            .clone()
            .unwrap_or_else(|| format!("{}://{}/warehouse", self.table.scheme, self.table.bucket))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_derivations() {
        let config = JobConfig::default();
        assert_eq!(
            config.table_location(),
            "s3a://spark-data/default/test_spark_table"
        );
        assert_eq!(
            config.qualified_table_name(),
            "hive.default.test_spark_table"
        );
        assert_eq!(config.warehouse_dir(), "s3a://spark-data/warehouse");
    }

    #[test]
    fn test_bucket_changes_only_location() {
        let mut config = JobConfig::default();
        config.table.bucket = "custom-bucket".to_string();
        assert_eq!(
            config.table_location(),
            "s3a://custom-bucket/default/test_spark_table"
        );
        assert_eq!(
            config.qualified_table_name(),
            "hive.default.test_spark_table"
        );
    }

    #[test]
    fn test_explicit_warehouse_dir_wins() {
        let mut config = JobConfig::default();
        config.catalog.warehouse_dir = Some("s3a://lake/hive".to_string());
        assert_eq!(config.warehouse_dir(), "s3a://lake/hive");
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert_eq!(
            "memory".parse::<StorageBackend>().unwrap(),
            StorageBackend::Memory
        );
        assert!("gcs".parse::<StorageBackend>().is_err());

        assert_eq!("REST".parse::<CatalogBackend>().unwrap(), CatalogBackend::Rest);
        assert_eq!(
            "overwrite".parse::<SaveMode>().unwrap(),
            SaveMode::Overwrite
        );
        assert_eq!(
            "error".parse::<SaveMode>().unwrap(),
            SaveMode::ErrorIfExists
        );
        assert_eq!(
            "none".parse::<Compression>().unwrap(),
            Compression::Uncompressed
        );
    }

    #[test]
    fn test_default_configs() {
        let config = JobConfig::default();
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.catalog.backend, CatalogBackend::Storage);
        assert_eq!(config.write.mode, SaveMode::Overwrite);
        assert!(!config.write.fail_on_error);
        assert!(config.session.catalog_support);
        assert_eq!(config.session.app_name, "SparkWriteTestToMinioHive");
        assert_eq!(config.log.format, LogFormat::Text);
        assert_eq!(SaveMode::default(), SaveMode::ErrorIfExists);
        assert_eq!(Compression::default(), Compression::Snappy);
    }

    #[test]
    fn test_toml_sections_default_independently() {
        let config: JobConfig = toml::from_str(
            r#"
            [table]
            bucket = "lake"

            [write]
            fail_on_error = true
            "#,
        )
        .unwrap();

        assert_eq!(config.table.bucket, "lake");
        assert_eq!(config.table.name, "test_spark_table");
        assert!(config.write.fail_on_error);
        assert_eq!(config.write.mode, SaveMode::Overwrite);
        assert_eq!(config.storage.backend, StorageBackend::S3);
    }
}
