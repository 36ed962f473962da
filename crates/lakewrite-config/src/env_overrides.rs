use super::{
    CatalogBackend, Compression, FsConfig, JobConfig, LogFormat, S3Config, SaveMode,
    StorageBackend,
};
use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;

pub const ENV_PREFIX: &str = "LAKEWRITE_";

/// Unprefixed bucket override kept for compatibility with existing job manifests.
pub const BUCKET_ENV: &str = "S3_BUCKET_NAME";

/// Abstraction over environment-variable lookups so configuration can be
/// resolved in tests without touching the process environment.
pub trait EnvSource {
    /// Get an environment variable with the LAKEWRITE_ prefix applied
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the LAKEWRITE_ prefix
    /// Used for S3_BUCKET_NAME and the AWS standard variables
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// In-memory environment, keyed by the full variable name
#[derive(Debug, Clone, Default)]
pub struct MapEnvSource {
    vars: HashMap<String, String>,
}

impl MapEnvSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnvSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl EnvSource for MapEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        self.vars.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

/// Apply environment-variable overrides (highest priority) to the job config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut JobConfig, env: &E) -> Result<()> {
    // Table naming
    if let Some(bucket) = get_raw_env_string(env, BUCKET_ENV)? {
        config.table.bucket = bucket;
    }
    if let Some(bucket) = get_env_string(env, "TABLE_BUCKET")? {
        config.table.bucket = bucket;
    }
    if let Some(schema) = get_env_string(env, "TABLE_SCHEMA")? {
        config.table.schema = schema;
    }
    if let Some(name) = get_env_string(env, "TABLE_NAME")? {
        config.table.name = name;
    }
    if let Some(catalog) = get_env_string(env, "CATALOG_NAME")? {
        config.table.catalog = catalog;
    }
    if let Some(scheme) = get_env_string(env, "TABLE_SCHEME")? {
        config.table.scheme = scheme;
    }

    // Session
    if let Some(app_name) = get_env_string(env, "APP_NAME")? {
        config.session.app_name = app_name;
    }
    if let Some(val) = get_env_bool(env, "CATALOG_SUPPORT")? {
        config.session.catalog_support = val;
    }

    // Catalog
    if let Some(backend) = get_env_string(env, "CATALOG_BACKEND")? {
        config.catalog.backend = backend
            .parse::<CatalogBackend>()
            .context("Invalid LAKEWRITE_CATALOG_BACKEND value")?;
    }
    if let Some(uri) = get_env_string(env, "CATALOG_URI")? {
        config.catalog.uri = Some(uri);
    }
    if let Some(token) = get_env_string(env, "CATALOG_TOKEN")? {
        config.catalog.token = Some(token);
    }
    if let Some(warehouse) = get_env_string(env, "WAREHOUSE_DIR")? {
        config.catalog.warehouse_dir = Some(warehouse);
    }
    if let Some(timeout) = get_env_u64(env, "CATALOG_TIMEOUT_SECS")? {
        config.catalog.timeout_secs = timeout;
    }

    // Storage backend
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND")? {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid LAKEWRITE_STORAGE_BACKEND value")?;
    }
    if let Some(row_group_size) = get_env_usize(env, "PARQUET_ROW_GROUP_SIZE")? {
        config.storage.parquet_row_group_size = row_group_size;
    }

    // Filesystem storage
    if let Some(path) = get_env_string(env, "STORAGE_PATH")? {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }

    // S3 storage, AWS standard variables without the LAKEWRITE_ prefix
    if let Some(region) = get_raw_env_string(env, "AWS_REGION")? {
        ensure_s3(config).region = region;
    }
    if let Some(endpoint) = get_raw_env_string(env, "AWS_ENDPOINT_URL")? {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(endpoint) = get_env_string(env, "S3_ENDPOINT")? {
        ensure_s3(config).endpoint = Some(endpoint);
    }
    if let Some(access_key_id) = get_raw_env_string(env, "AWS_ACCESS_KEY_ID")? {
        ensure_s3(config).access_key_id = Some(access_key_id);
    }
    if let Some(secret_access_key) = get_raw_env_string(env, "AWS_SECRET_ACCESS_KEY")? {
        ensure_s3(config).secret_access_key = Some(secret_access_key);
    }

    // Write step
    if let Some(mode) = get_env_string(env, "WRITE_MODE")? {
        config.write.mode = mode
            .parse::<SaveMode>()
            .context("Invalid LAKEWRITE_WRITE_MODE value")?;
    }
    if let Some(val) = get_env_bool(env, "FAIL_ON_WRITE_ERROR")? {
        config.write.fail_on_error = val;
    }
    if let Some(compression) = get_env_string(env, "COMPRESSION")? {
        config.write.compression = compression
            .parse::<Compression>()
            .context("Invalid LAKEWRITE_COMPRESSION value")?;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    Ok(())
}

fn ensure_s3(config: &mut JobConfig) -> &mut S3Config {
    config.storage.s3.get_or_insert_with(S3Config::default)
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key).filter(|v| !v.trim().is_empty()))
}

fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key).filter(|v| !v.trim().is_empty()))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(value) => value
            .parse::<usize>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {}{} value '{}': {}", ENV_PREFIX, key, value, e)),
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(value) => value
            .parse::<u64>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {}{} value '{}': {}", ENV_PREFIX, key, value, e)),
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key)? {
        Some(value) => match value.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(anyhow!(
                "Invalid {}{} value '{}': expected true/false",
                ENV_PREFIX,
                key,
                value
            )),
        },
        None => Ok(None),
    }
}
