// Configuration validation
//
// Validates that required fields are present and values are sensible

use crate::*;
use anyhow::{bail, Result};
use tracing::warn;

const SUPPORTED_SCHEMES: [&str; 3] = ["s3", "s3a", "s3n"];

pub fn validate_config(config: &JobConfig) -> Result<()> {
    validate_table_config(&config.table)?;
    validate_session_config(&config.session)?;
    validate_catalog_config(&config.catalog)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

fn validate_identifier(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{} must not be empty", field);
    }

    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        bail!(
            "{} '{}' may only contain ASCII letters, digits and '_'",
            field,
            value
        );
    }

    Ok(())
}

// Metastores store schema and table names lower-cased
fn validate_lowercase(field: &str, value: &str) -> Result<()> {
    if value.chars().any(|c| c.is_ascii_uppercase()) {
        bail!(
            "{} '{}' must be lower-case (use '{}')",
            field,
            value,
            value.to_ascii_lowercase()
        );
    }

    Ok(())
}

fn validate_table_config(config: &TableConfig) -> Result<()> {
    validate_identifier("table.schema", &config.schema)?;
    validate_identifier("table.name", &config.name)?;
    validate_lowercase("table.schema", &config.schema)?;
    validate_lowercase("table.name", &config.name)?;
    validate_identifier("table.catalog", &config.catalog)?;

    if config.bucket.is_empty() {
        bail!("table.bucket must not be empty");
    }

    if config.bucket.contains('/') || config.bucket.contains(char::is_whitespace) {
        bail!(
            "table.bucket '{}' must not contain '/' or whitespace",
            config.bucket
        );
    }

    if !SUPPORTED_SCHEMES.contains(&config.scheme.as_str()) {
        bail!(
            "table.scheme '{}' is not supported. Supported: {}",
            config.scheme,
            SUPPORTED_SCHEMES.join(", ")
        );
    }

    Ok(())
}

fn validate_session_config(config: &SessionConfig) -> Result<()> {
    if config.app_name.trim().is_empty() {
        bail!("session.app_name must not be empty");
    }

    Ok(())
}

fn validate_catalog_config(config: &CatalogConfig) -> Result<()> {
    if config.timeout_secs == 0 {
        bail!("catalog.timeout_secs must be greater than 0");
    }

    match config.backend {
        CatalogBackend::Rest => {
            let uri = config
                .uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("rest catalog backend requires catalog.uri"))?;

            if !(uri.starts_with("http://") || uri.starts_with("https://")) {
                bail!("catalog.uri '{}' must start with http:// or https://", uri);
            }
        }
        CatalogBackend::Storage | CatalogBackend::Memory => {
            if config.uri.is_some() {
                warn!(
                    backend = %config.backend,
                    "catalog.uri is set but only used by the rest backend"
                );
            }
        }
    }

    if let Some(warehouse) = config.warehouse_dir.as_deref() {
        if !warehouse.contains("://") {
            bail!(
                "catalog.warehouse_dir '{}' must be a URL such as s3a://bucket/warehouse",
                warehouse
            );
        }
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.parquet_row_group_size == 0 {
        bail!("storage.parquet_row_group_size must be greater than 0");
    }

    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!("storage.fs.path must not be empty");
            }
        }
        StorageBackend::S3 => {
            if let Some(s3) = config.s3.as_ref() {
                if s3.region.is_empty() {
                    bail!("storage.s3.region is required for S3 backend");
                }

                if s3.access_key_id.is_some() != s3.secret_access_key.is_some() {
                    bail!(
                        "storage.s3.access_key_id and storage.s3.secret_access_key must be set together"
                    );
                }
            }
        }
        StorageBackend::Memory => {
            warn!("memory storage backend selected; written data is discarded on exit");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&JobConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_table_config() {
        let mut table = TableConfig::default();
        table.name = "my-table".to_string();
        assert!(validate_table_config(&table).is_err());

        let mut table = TableConfig::default();
        table.schema = String::new();
        assert!(validate_table_config(&table).is_err());

        let mut table = TableConfig::default();
        table.scheme = "gs".to_string();
        assert!(validate_table_config(&table).is_err());

        let mut table = TableConfig::default();
        table.bucket = "a/b".to_string();
        assert!(validate_table_config(&table).is_err());
    }

    #[test]
    fn test_mixed_case_table_names_rejected() {
        let mut table = TableConfig::default();
        table.schema = "Default".to_string();
        let err = validate_table_config(&table).unwrap_err();
        assert!(err.to_string().contains("use 'default'"));

        let mut table = TableConfig::default();
        table.name = "Test_Spark_Table".to_string();
        assert!(validate_table_config(&table).is_err());

        let mut table = TableConfig::default();
        table.catalog = "Hive".to_string();
        assert!(validate_table_config(&table).is_ok());
    }

    #[test]
    fn test_validate_catalog_config() {
        let rest_without_uri = CatalogConfig {
            backend: CatalogBackend::Rest,
            ..CatalogConfig::default()
        };
        assert!(validate_catalog_config(&rest_without_uri).is_err());

        let rest = CatalogConfig {
            backend: CatalogBackend::Rest,
            uri: Some("http://metastore:8181".to_string()),
            ..CatalogConfig::default()
        };
        assert!(validate_catalog_config(&rest).is_ok());

        let thrift = CatalogConfig {
            backend: CatalogBackend::Rest,
            uri: Some("thrift://metastore:9083".to_string()),
            ..CatalogConfig::default()
        };
        assert!(validate_catalog_config(&thrift).is_err());

        let bad_warehouse = CatalogConfig {
            warehouse_dir: Some("/tmp/warehouse".to_string()),
            ..CatalogConfig::default()
        };
        assert!(validate_catalog_config(&bad_warehouse).is_err());
    }

    #[test]
    fn test_validate_storage_config() {
        let fs_missing = StorageConfig {
            backend: StorageBackend::Fs,
            fs: None,
            ..StorageConfig::default()
        };
        assert!(validate_storage_config(&fs_missing).is_err());

        let half_credentials = StorageConfig {
            s3: Some(S3Config {
                access_key_id: Some("key".to_string()),
                ..S3Config::default()
            }),
            ..StorageConfig::default()
        };
        assert!(validate_storage_config(&half_credentials).is_err());

        let zero_row_groups = StorageConfig {
            parquet_row_group_size: 0,
            ..StorageConfig::default()
        };
        assert!(validate_storage_config(&zero_row_groups).is_err());
    }
}
