use crate::cli::Cli;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for backend construction.
///
/// Can be loaded from files, env vars, or CLI args with precedence order:
/// CLI > File > Environment > Defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// Root directory under which each local-disk user gets a subdirectory.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,
    /// Reject unknown backend tags instead of falling back to `local`.
    #[serde(default)]
    pub strict_backend_tags: bool,
    #[serde(default)]
    pub s3: S3Config,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct S3Config {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, localstack). Implies path-style addressing
    /// unless overridden.
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data")
}

fn default_bucket() -> String {
    "tenant-storage".to_string()
}

fn default_prefix() -> String {
    "users/".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            local_root: default_local_root(),
            strict_backend_tags: false,
            s3: S3Config::default(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            prefix: default_prefix(),
            region: default_region(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Create config from environment variables.
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let storage = &mut config.storage;

        if let Some(root) = lookup("TENANT_STORAGE_LOCAL_ROOT") {
            storage.local_root = PathBuf::from(root);
        }
        let strict = lookup("TENANT_STORAGE_STRICT_TAGS");
        if let Some(strict) = strict.as_deref().and_then(parse_bool) {
            storage.strict_backend_tags = strict;
        }
        if let Some(bucket) = lookup("TENANT_STORAGE_S3_BUCKET") {
            storage.s3.bucket = bucket;
        }
        if let Some(prefix) = lookup("TENANT_STORAGE_S3_PREFIX") {
            storage.s3.prefix = prefix;
        }
        if let Some(region) = lookup("AWS_REGION") {
            storage.s3.region = region;
        }
        if let Some(endpoint) = lookup("TENANT_STORAGE_S3_ENDPOINT") {
            storage.s3.endpoint = Some(endpoint);
            storage.s3.force_path_style = true;
        }

        config
    }

    /// Create config with CLI args taking precedence over file and environment.
    pub fn from_sources(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from_file(path)?,
            None => Self::from_env(),
        };

        let storage = &mut config.storage;
        if let Some(root) = &cli.local_root {
            storage.local_root = root.clone();
        }
        if cli.strict_tags {
            storage.strict_backend_tags = true;
        }
        if let Some(bucket) = &cli.s3_bucket {
            storage.s3.bucket = bucket.clone();
        }
        if let Some(prefix) = &cli.s3_prefix {
            storage.s3.prefix = prefix.clone();
        }
        if let Some(region) = &cli.aws_region {
            storage.s3.region = region.clone();
        }
        if let Some(endpoint) = &cli.s3_endpoint {
            storage.s3.endpoint = Some(endpoint.clone());
            storage.s3.force_path_style = true;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.local_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation("local_root must not be empty".to_string()));
        }
        if self.storage.s3.bucket.trim().is_empty() {
            return Err(ConfigError::Validation("s3.bucket must not be empty".to_string()));
        }
        Ok(())
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_env_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("TENANT_STORAGE_LOCAL_ROOT", "/srv/files"),
            ("TENANT_STORAGE_STRICT_TAGS", "yes"),
            ("TENANT_STORAGE_S3_BUCKET", "uploads"),
            ("TENANT_STORAGE_S3_ENDPOINT", "http://localhost:9000"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.storage.local_root, PathBuf::from("/srv/files"));
        assert!(config.storage.strict_backend_tags);
        assert_eq!(config.storage.s3.bucket, "uploads");
        assert_eq!(config.storage.s3.prefix, "users/");
        assert_eq!(config.storage.s3.endpoint.as_deref(), Some("http://localhost:9000"));
        assert!(config.storage.s3.force_path_style);
    }

    #[test]
    fn test_unparseable_env_keeps_default() {
        let config = Config::from_lookup(|k| {
            (k == "TENANT_STORAGE_STRICT_TAGS").then(|| "maybe".to_string())
        });
        assert!(!config.storage.strict_backend_tags);
    }

    #[test]
    fn test_file_roundtrip_and_partial_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.storage.s3.bucket = "team-files".to_string();
        config.save_to_file(&path).unwrap();
        assert_eq!(Config::load_from_file(&path).unwrap(), config);

        std::fs::write(&path, r#"{"storage": {"local_root": "/tmp/x"}}"#).unwrap();
        let partial = Config::load_from_file(&path).unwrap();
        assert_eq!(partial.storage.local_root, PathBuf::from("/tmp/x"));
        assert_eq!(partial.storage.s3, S3Config::default());
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config = Config::default();
        config.storage.s3.bucket = " ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }
}
