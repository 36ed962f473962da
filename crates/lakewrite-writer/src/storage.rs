//! Object storage access through OpenDAL
//!
//! Table locations are URLs (`s3a://bucket/schema/table`). The S3 backend
//! builds an operator for the location's bucket; the fs and memory backends
//! keep every bucket under a single root as `<bucket>/<key>`.

use crate::error::{Result, WriterError};
use bytes::Bytes;
use lakewrite_config::{S3Config, StorageBackend, StorageConfig};
use opendal::{ErrorKind, Operator};

/// A parsed `<scheme>://<bucket>/<key>` location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLocation {
    scheme: String,
    bucket: String,
    key: String,
}

impl TableLocation {
    pub fn parse(location: &str) -> Result<Self> {
        let url = url::Url::parse(location).map_err(|e| {
            WriterError::invalid_config(format!("Invalid location '{}': {}", location, e))
        })?;

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                WriterError::invalid_config(format!(
                    "Location '{}' has no bucket component",
                    location
                ))
            })?
            .to_string();

        // Dot segments are already resolved by the URL parser
        let key = url.path().trim_matches('/').to_string();

        Ok(Self {
            scheme: url.scheme().to_string(),
            bucket,
            key,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The bucket itself, with an empty key
    pub fn root(&self) -> Self {
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key: String::new(),
        }
    }

    /// Location of a child object or directory
    pub fn join(&self, child: &str) -> Self {
        let child = child.trim_matches('/');
        let key = if self.key.is_empty() {
            child.to_string()
        } else {
            format!("{}/{}", self.key, child)
        };
        Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key,
        }
    }
}

impl std::fmt::Display for TableLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}://{}", self.scheme, self.bucket)
        } else {
            write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
        }
    }
}

#[derive(Clone)]
enum Backend {
    /// One operator per bucket, created on demand
    S3(S3Config),
    /// Single operator holding all buckets as top-level directories
    Rooted { operator: Operator, label: String },
}

/// Storage handle shared by the session, the writer and the storage catalog
#[derive(Clone)]
pub struct Storage {
    backend: Backend,
}

impl Storage {
    /// Create storage from configuration
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let backend = match config.backend {
            StorageBackend::S3 => Backend::S3(config.s3.clone().unwrap_or_default()),
            StorageBackend::Fs => {
                let fs = config.fs.as_ref().ok_or_else(|| {
                    WriterError::invalid_config(
                        "fs config required for filesystem backend".to_string(),
                    )
                })?;

                let fs_builder = opendal::services::Fs::default().root(&fs.path);
                let operator = Operator::new(fs_builder)
                    .map_err(|e| {
                        WriterError::invalid_config(format!(
                            "Failed to create filesystem operator: {}",
                            e
                        ))
                    })?
                    .finish();

                Backend::Rooted {
                    operator,
                    label: format!("fs:{}", fs.path),
                }
            }
            StorageBackend::Memory => {
                let operator = Operator::new(opendal::services::Memory::default())
                    .map_err(|e| {
                        WriterError::invalid_config(format!(
                            "Failed to create memory operator: {}",
                            e
                        ))
                    })?
                    .finish();

                Backend::Rooted {
                    operator,
                    label: "memory".to_string(),
                }
            }
        };

        Ok(Self { backend })
    }

    /// Wrap an existing operator; buckets become top-level directories
    pub fn from_operator(operator: Operator) -> Self {
        let label = operator.info().scheme().to_string();
        Self {
            backend: Backend::Rooted { operator, label },
        }
    }

    /// Human-readable backend description for logs
    pub fn describe(&self) -> String {
        match &self.backend {
            Backend::S3(s3) => match &s3.endpoint {
                Some(endpoint) => format!("s3 (region={}, endpoint={})", s3.region, endpoint),
                None => format!("s3 (region={})", s3.region),
            },
            Backend::Rooted { label, .. } => label.clone(),
        }
    }

    /// Resolve a location to an operator and the directory prefix inside it
    fn resolve(&self, location: &TableLocation) -> Result<(Operator, String)> {
        let dir = |base: String| {
            if base.is_empty() {
                String::new()
            } else {
                format!("{}/", base)
            }
        };

        match &self.backend {
            Backend::S3(s3) => {
                let mut s3_builder = opendal::services::S3::default()
                    .bucket(location.bucket())
                    .region(&s3.region);

                if let Some(endpoint) = &s3.endpoint {
                    s3_builder = s3_builder.endpoint(endpoint);
                }
                if let (Some(key), Some(secret)) = (&s3.access_key_id, &s3.secret_access_key) {
                    s3_builder = s3_builder.access_key_id(key).secret_access_key(secret);
                }

                let operator = Operator::new(s3_builder)
                    .map_err(|e| {
                        WriterError::invalid_config(format!(
                            "Failed to create S3 operator for bucket '{}': {}",
                            location.bucket(),
                            e
                        ))
                    })?
                    .finish();

                Ok((operator, dir(location.key().to_string())))
            }
            Backend::Rooted { operator, .. } => {
                let base = if location.key().is_empty() {
                    location.bucket().to_string()
                } else {
                    format!("{}/{}", location.bucket(), location.key())
                };
                Ok((operator.clone(), dir(base)))
            }
        }
    }

    /// List object names below a location, relative to it
    pub async fn list(&self, location: &TableLocation) -> Result<Vec<String>> {
        let (op, prefix) = self.resolve(location)?;

        let entries = match op.list_with(&prefix).recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(WriterError::write_failure(format!(
                    "Failed to list '{}': {}",
                    location, e
                )))
            }
        };

        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.metadata().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(prefix.as_str())
                    .map(|name| name.to_string())
            })
            .filter(|name| !name.is_empty())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Whether any object exists below a location
    pub async fn has_objects(&self, location: &TableLocation) -> Result<bool> {
        Ok(!self.list(location).await?.is_empty())
    }

    /// Delete every object below a location, returning how many were removed
    pub async fn clear(&self, location: &TableLocation) -> Result<usize> {
        let names = self.list(location).await?;
        let (op, prefix) = self.resolve(location)?;

        for name in &names {
            let path = format!("{}{}", prefix, name);
            op.delete(&path).await.map_err(|e| {
                WriterError::write_failure(format!("Failed to delete '{}': {}", path, e))
            })?;
        }

        if !names.is_empty() {
            tracing::debug!("Removed {} objects under '{}'", names.len(), location);
        }
        Ok(names.len())
    }

    /// Write an object below a location
    pub async fn put(&self, location: &TableLocation, name: &str, bytes: Vec<u8>) -> Result<()> {
        let (op, prefix) = self.resolve(location)?;
        let path = format!("{}{}", prefix, name);

        op.write(&path, bytes).await.map_err(|e| {
            WriterError::write_failure(format!(
                "Failed to write '{}': {}",
                location.join(name),
                e
            ))
        })?;
        Ok(())
    }

    /// Read an object below a location; `None` when it does not exist
    pub async fn get(&self, location: &TableLocation, name: &str) -> Result<Option<Bytes>> {
        let (op, prefix) = self.resolve(location)?;
        let path = format!("{}{}", prefix, name);

        match op.read(&path).await {
            Ok(buffer) => Ok(Some(buffer.to_bytes())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WriterError::write_failure(format!(
                "Failed to read '{}': {}",
                location.join(name),
                e
            ))),
        }
    }

    /// Delete one object; `false` when it did not exist
    pub async fn delete(&self, location: &TableLocation, name: &str) -> Result<bool> {
        let (op, prefix) = self.resolve(location)?;
        let path = format!("{}{}", prefix, name);

        let existed = op.exists(&path).await.map_err(|e| {
            WriterError::write_failure(format!("Failed to stat '{}': {}", path, e))
        })?;
        if existed {
            op.delete(&path).await.map_err(|e| {
                WriterError::write_failure(format!("Failed to delete '{}': {}", path, e))
            })?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_storage() -> Storage {
        let op = Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        Storage::from_operator(op)
    }

    #[test]
    fn parses_s3a_location() {
        let loc = TableLocation::parse("s3a://custom-bucket/default/test_spark_table").unwrap();
        assert_eq!(loc.scheme(), "s3a");
        assert_eq!(loc.bucket(), "custom-bucket");
        assert_eq!(loc.key(), "default/test_spark_table");
        assert_eq!(
            loc.to_string(),
            "s3a://custom-bucket/default/test_spark_table"
        );
    }

    #[test]
    fn join_and_trailing_slashes() {
        let loc = TableLocation::parse("s3://bucket/warehouse/").unwrap();
        assert_eq!(loc.key(), "warehouse");
        assert_eq!(
            loc.join("/sales.db/orders/").to_string(),
            "s3://bucket/warehouse/sales.db/orders"
        );

        let root = TableLocation::parse("s3://bucket").unwrap();
        assert_eq!(root.key(), "");
        assert_eq!(root.join("t").to_string(), "s3://bucket/t");
        assert_eq!(loc.root(), root);
    }

    #[test]
    fn rejects_bad_locations() {
        assert!(TableLocation::parse("not a url").is_err());
        assert!(TableLocation::parse("s3a:///no-bucket").is_err());
        assert_eq!(
            TableLocation::parse("s3a://bucket/a/../b").unwrap().key(),
            "b"
        );
    }

    #[tokio::test]
    async fn put_list_clear_roundtrip() {
        let storage = memory_storage();
        let loc = TableLocation::parse("s3a://bucket/default/t").unwrap();
        let sibling = TableLocation::parse("s3a://bucket/default/t2").unwrap();

        assert!(!storage.has_objects(&loc).await.unwrap());

        storage.put(&loc, "a.parquet", b"a".to_vec()).await.unwrap();
        storage.put(&loc, "_SUCCESS", Vec::new()).await.unwrap();
        storage.put(&sibling, "b.parquet", b"b".to_vec()).await.unwrap();

        assert_eq!(
            storage.list(&loc).await.unwrap(),
            vec!["_SUCCESS".to_string(), "a.parquet".to_string()]
        );
        assert_eq!(
            storage.get(&loc, "a.parquet").await.unwrap().unwrap(),
            Bytes::from_static(b"a")
        );
        assert!(storage.get(&loc, "missing").await.unwrap().is_none());

        assert_eq!(storage.clear(&loc).await.unwrap(), 2);
        assert!(!storage.has_objects(&loc).await.unwrap());
        assert!(storage.has_objects(&sibling).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let storage = memory_storage();
        let loc = TableLocation::parse("s3a://bucket/x").unwrap();
        storage.put(&loc, "f", b"1".to_vec()).await.unwrap();
        assert!(storage.delete(&loc, "f").await.unwrap());
        assert!(!storage.delete(&loc, "f").await.unwrap());
    }

    #[test]
    fn fs_backend_requires_path() {
        let config = StorageConfig {
            backend: StorageBackend::Fs,
            fs: None,
            ..StorageConfig::default()
        };
        assert!(Storage::from_config(&config).is_err());
    }

    #[test]
    fn describe_s3_backend() {
        let storage = Storage::from_config(&StorageConfig::default()).unwrap();
        assert_eq!(storage.describe(), "s3 (region=us-east-1)");
    }
}
