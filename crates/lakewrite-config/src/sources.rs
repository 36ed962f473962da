// Configuration source loading.
//
// Priority order:
// 1. Environment variables (S3_BUCKET_NAME, AWS_*, LAKEWRITE_* prefix)
// 2. Config file path from LAKEWRITE_CONFIG
// 3. Inline config content from LAKEWRITE_CONFIG_CONTENT
// 4. Default config file (./lakewrite.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::JobConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "./lakewrite.toml";

/// Load configuration reading files and overrides through `env`.
pub(crate) fn load_config<E: EnvSource>(env: &E) -> Result<JobConfig> {
    let mut config = load_from_file(env)?.unwrap_or_default();
    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file<E: EnvSource>(env: &E) -> Result<Option<JobConfig>> {
    if let Some(path) = env.get("CONFIG") {
        return parse_file(Path::new(&path)).map(Some);
    }

    if let Some(content) = env.get("CONFIG_CONTENT") {
        let config: JobConfig = toml::from_str(&content).with_context(|| {
            format!(
                "Failed to parse inline config from {}CONFIG_CONTENT",
                ENV_PREFIX
            )
        })?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return parse_file(default_path).map(Some);
    }

    Ok(None)
}

fn parse_file(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
/// Environment overrides still apply on top of the file.
pub(crate) fn load_from_file_path<E: EnvSource>(
    path: impl AsRef<Path>,
    env: &E,
) -> Result<JobConfig> {
    let mut config = parse_file(path.as_ref())?;
    env_overrides::apply_env_overrides(&mut config, env)?;
    config.validate()?;
    Ok(config)
}

/// Process environment
pub struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MapEnvSource, SaveMode, StorageBackend};

    #[test]
    fn inline_content_then_env_overrides() {
        let env: MapEnvSource = [
            (
                "LAKEWRITE_CONFIG_CONTENT",
                "[table]\nbucket = \"from-file\"\n[storage]\nbackend = \"memory\"\n",
            ),
            ("S3_BUCKET_NAME", "from-env"),
        ]
        .into_iter()
        .collect();

        let config = load_config(&env).unwrap();
        assert_eq!(config.table.bucket, "from-env");
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.write.mode, SaveMode::Overwrite);
    }

    #[test]
    fn malformed_inline_content_is_an_error() {
        let env = MapEnvSource::new().with("LAKEWRITE_CONFIG_CONTENT", "[table\nbucket=");
        assert!(load_config(&env).is_err());
    }

    #[test]
    fn missing_config_path_is_an_error() {
        let env = MapEnvSource::new().with("LAKEWRITE_CONFIG", "/definitely/not/here.toml");
        let err = load_config(&env).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn invalid_override_fails_validation() {
        let env = MapEnvSource::new()
            .with("LAKEWRITE_CONFIG_CONTENT", "")
            .with("S3_BUCKET_NAME", "bad/bucket");
        assert!(load_config(&env).is_err());
    }
}
