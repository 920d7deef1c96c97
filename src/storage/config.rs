//! Configuration for the Log Store
//!
//! Loaded from `LOGSTORE_*` environment variables or a TOML file; every
//! section has a `test()` preset with tiny batches and millisecond backoff.

use crate::logs::error::{LogStoreError, LogStoreResult};
use crate::storage::object_store::{InMemoryObjectStore, LocalFsObjectStore, ObjectStore};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Bucket used when none is configured
pub const DEFAULT_BUCKET: &str = "validator-logs";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogStoreConfig {
    /// Object store type
    pub store_type: ObjectStoreType,
    /// Local filesystem root (for LocalFs store)
    pub local_path: Option<PathBuf>,
    /// S3 settings (for S3 store)
    pub s3: S3Config,
    /// Writer batching
    pub writer: WriterConfig,
    /// Retry and timeout policy shared by writer and reader
    pub retry: RetryConfig,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        LogStoreConfig {
            store_type: ObjectStoreType::InMemory,
            local_path: None,
            s3: S3Config::default(),
            writer: WriterConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl LogStoreConfig {
    /// Create config for local development
    pub fn local(path: PathBuf) -> Self {
        LogStoreConfig {
            store_type: ObjectStoreType::LocalFs,
            local_path: Some(path),
            ..Default::default()
        }
    }

    /// Create config for testing (in-memory)
    pub fn test() -> Self {
        LogStoreConfig {
            store_type: ObjectStoreType::InMemory,
            local_path: None,
            s3: S3Config::default(),
            writer: WriterConfig::test(),
            retry: RetryConfig::test(),
        }
    }

    /// Load configuration from `LOGSTORE_*` environment variables.
    ///
    /// Unset or unparsable values keep their defaults; `validate` reports
    /// combinations that cannot work.
    pub fn from_env() -> Self {
        let defaults = LogStoreConfig::default();
        LogStoreConfig {
            store_type: env_parse("LOGSTORE_STORE_TYPE").unwrap_or(defaults.store_type),
            local_path: std::env::var("LOGSTORE_LOCAL_PATH").ok().map(PathBuf::from),
            s3: S3Config {
                bucket: std::env::var("LOGSTORE_S3_BUCKET")
                    .unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
                prefix: std::env::var("LOGSTORE_S3_PREFIX").unwrap_or_default(),
                region: std::env::var("LOGSTORE_S3_REGION")
                    .unwrap_or_else(|_| defaults.s3.region.clone()),
                endpoint: std::env::var("LOGSTORE_S3_ENDPOINT").ok(),
                allow_http: std::env::var("LOGSTORE_S3_ALLOW_HTTP")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },
            writer: WriterConfig {
                max_batch_entries: env_parse("LOGSTORE_BATCH_ENTRIES")
                    .unwrap_or(defaults.writer.max_batch_entries),
                flush_interval: env_parse("LOGSTORE_FLUSH_INTERVAL_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.writer.flush_interval),
            },
            retry: RetryConfig {
                max_attempts: env_parse("LOGSTORE_MAX_ATTEMPTS")
                    .unwrap_or(defaults.retry.max_attempts),
                base_backoff: env_parse("LOGSTORE_BACKOFF_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.base_backoff),
                max_backoff: defaults.retry.max_backoff,
                op_timeout: env_parse("LOGSTORE_OP_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.retry.op_timeout),
            },
        }
    }

    pub fn from_toml_str(text: &str) -> LogStoreResult<Self> {
        let config: LogStoreConfig =
            toml::from_str(text).map_err(|e| LogStoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> LogStoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| LogStoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> LogStoreResult<()> {
        if self.writer.max_batch_entries == 0 {
            return Err(LogStoreError::Config(
                "writer.max_batch_entries must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(LogStoreError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry.op_timeout.is_zero() {
            return Err(LogStoreError::Config(
                "retry.op_timeout must be positive".to_string(),
            ));
        }
        match self.store_type {
            ObjectStoreType::LocalFs if self.local_path.is_none() => Err(LogStoreError::Config(
                "local_path is required for the localfs store".to_string(),
            )),
            ObjectStoreType::S3 if self.s3.bucket.is_empty() => Err(LogStoreError::Config(
                "s3.bucket must not be empty".to_string(),
            )),
            _ => Ok(()),
        }
    }

    /// Build the configured backend, shared by every writer and reader of the process
    pub fn open_store(&self) -> LogStoreResult<Arc<dyn ObjectStore>> {
        self.validate()?;
        match self.store_type {
            ObjectStoreType::InMemory => Ok(Arc::new(InMemoryObjectStore::new())),
            ObjectStoreType::LocalFs => {
                let path = self.local_path.clone().ok_or_else(|| {
                    LogStoreError::Config("local_path is required".to_string())
                })?;
                std::fs::create_dir_all(&path)
                    .map_err(|e| LogStoreError::Config(format!("{}: {}", path.display(), e)))?;
                Ok(Arc::new(LocalFsObjectStore::new(path)))
            }
            #[cfg(feature = "s3")]
            ObjectStoreType::S3 => {
                let store = crate::storage::s3_store::S3ObjectStore::new(&self.s3)
                    .map_err(|e| LogStoreError::Config(e.to_string()))?;
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "s3"))]
            ObjectStoreType::S3 => Err(LogStoreError::Config(
                "built without the `s3` feature".to_string(),
            )),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Type of object store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStoreType {
    /// In-memory store (for tests)
    #[serde(rename = "memory", alias = "inmemory")]
    InMemory,
    /// Local filesystem
    LocalFs,
    /// Amazon S3 or compatible (MinIO, SeaweedFS)
    S3,
}

impl std::str::FromStr for ObjectStoreType {
    type Err = LogStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(ObjectStoreType::InMemory),
            "localfs" | "local" => Ok(ObjectStoreType::LocalFs),
            "s3" => Ok(ObjectStoreType::S3),
            other => Err(LogStoreError::Config(format!(
                "unknown store type {:?} (expected memory, localfs or s3)",
                other
            ))),
        }
    }
}

/// S3 configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct S3Config {
    /// S3 bucket name
    pub bucket: String,
    /// Key prefix within bucket
    pub prefix: String,
    /// AWS region
    pub region: String,
    /// Custom endpoint (for S3-compatible services like MinIO or SeaweedFS)
    pub endpoint: Option<String>,
    /// Permit plain HTTP to the endpoint
    pub allow_http: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        S3Config {
            bucket: DEFAULT_BUCKET.to_string(),
            prefix: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            allow_http: false,
        }
    }
}

/// Writer batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Records per stored object; reaching it triggers a flush (default: 100)
    pub max_batch_entries: usize,
    /// Buffered records older than this are flushed on the next append (default: 5s)
    #[serde(with = "duration_millis")]
    pub flush_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            max_batch_entries: 100,
            flush_interval: Duration::from_secs(5),
        }
    }
}

impl WriterConfig {
    /// Configuration for tests (tiny batches)
    pub fn test() -> Self {
        WriterConfig {
            max_batch_entries: 4,
            flush_interval: Duration::from_millis(50),
        }
    }
}

/// Retry configuration: bounded exponential backoff plus a per-attempt timeout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per store operation, first included (default: 3)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt (default: 100ms)
    #[serde(with = "duration_millis")]
    pub base_backoff: Duration,
    /// Backoff ceiling (default: 2s)
    #[serde(with = "duration_millis")]
    pub max_backoff: Duration,
    /// Deadline for one attempt (default: 10s)
    #[serde(with = "duration_millis")]
    pub op_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            op_timeout: Duration::from_secs(10),
        }
    }
}

impl RetryConfig {
    /// Configuration for tests (fast backoff)
    pub fn test() -> Self {
        RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            op_timeout: Duration::from_millis(500),
        }
    }

    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        RetryConfig {
            max_attempts: 1,
            ..Self::test()
        }
    }
}

/// Serde helper for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogStoreConfig::default();
        assert_eq!(config.store_type, ObjectStoreType::InMemory);
        assert_eq!(config.s3.bucket, "validator-logs");
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_config_serialization() {
        let config = RetryConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"op_timeout\":10000"));
        let parsed: RetryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config.base_backoff, parsed.base_backoff);
        assert_eq!(config.op_timeout, parsed.op_timeout);
    }

    #[test]
    fn test_from_toml_partial() {
        let config = LogStoreConfig::from_toml_str(
            r#"
            store_type = "s3"

            [s3]
            bucket = "logs"
            endpoint = "http://localhost:8333"

            [writer]
            max_batch_entries = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.store_type, ObjectStoreType::S3);
        assert_eq!(config.s3.bucket, "logs");
        assert_eq!(config.s3.region, "us-east-1");
        assert_eq!(config.writer.max_batch_entries, 25);
        assert_eq!(config.writer.flush_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = LogStoreConfig::from_toml_str("[writer]\nmax_batch_entries = 0\n").unwrap_err();
        assert!(matches!(err, LogStoreError::Config(_)));

        let err = LogStoreConfig::from_toml_str("store_type = \"localfs\"\n").unwrap_err();
        assert!(err.to_string().contains("local_path"));

        assert!(LogStoreConfig::from_toml_str("store_type = \"tape\"\n").is_err());
    }

    #[test]
    fn test_store_type_from_str() {
        assert_eq!("memory".parse::<ObjectStoreType>().unwrap(), ObjectStoreType::InMemory);
        assert_eq!("LocalFs".parse::<ObjectStoreType>().unwrap(), ObjectStoreType::LocalFs);
        assert_eq!("S3".parse::<ObjectStoreType>().unwrap(), ObjectStoreType::S3);
        assert!("ftp".parse::<ObjectStoreType>().is_err());
    }

    #[tokio::test]
    async fn test_open_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogStoreConfig::local(dir.path().join("logs"));
        let store = config.open_store().unwrap();
        store.put("validator_1/r/config.json", b"{}").await.unwrap();
        assert!(store.exists("validator_1/r/config.json").await.unwrap());
    }
}
