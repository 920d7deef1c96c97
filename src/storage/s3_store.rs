//! S3 Object Store Implementation
//!
//! S3-compatible object store for production use, built on the `object_store`
//! crate from the Arrow ecosystem.
//!
//! Supports:
//! - AWS S3
//! - S3-compatible services (MinIO, SeaweedFS S3 gateway, LocalStack)
//! - Custom endpoints over plain HTTP for local clusters

use crate::storage::config::S3Config;
use crate::storage::object_store::{ListResult, ObjectMeta, ObjectStore, StoreFuture};
use futures::{StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore as ObjectStoreTrait;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::sync::Arc;

/// LIST page size, matching the S3 API maximum
const LIST_PAGE_SIZE: usize = 1000;

/// S3 Object Store bound to one bucket and an optional key prefix
#[derive(Clone)]
pub struct S3ObjectStore {
    store: Arc<dyn ObjectStoreTrait>,
    prefix: String,
}

impl S3ObjectStore {
    /// Create a new S3 object store
    ///
    /// Credentials come from the environment:
    /// - AWS_ACCESS_KEY_ID
    /// - AWS_SECRET_ACCESS_KEY
    pub fn new(config: &S3Config) -> IoResult<Self> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(config.allow_http || endpoint.starts_with("http://"))
                .with_virtual_hosted_style_request(false);
        }

        if let Ok(key_id) = std::env::var("AWS_ACCESS_KEY_ID") {
            builder = builder.with_access_key_id(key_id);
        }
        if let Ok(secret) = std::env::var("AWS_SECRET_ACCESS_KEY") {
            builder = builder.with_secret_access_key(secret);
        }

        let store = builder.build().map_err(|e| {
            IoError::new(
                ErrorKind::InvalidInput,
                format!("Failed to create S3 store: {}", e),
            )
        })?;

        Ok(S3ObjectStore {
            store: Arc::new(store),
            prefix: config.prefix.trim_matches('/').to_string(),
        })
    }

    /// Wrap an existing `object_store` backend (for testing with `object_store::memory::InMemory`)
    pub fn from_store(store: Arc<dyn ObjectStoreTrait>, prefix: &str) -> Self {
        S3ObjectStore {
            store,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    fn full_key(&self, key: &str) -> String {
        if self.prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}/{}", self.prefix, key)
        }
    }

    fn full_path(&self, key: &str) -> ObjectPath {
        ObjectPath::from(self.full_key(key))
    }

    fn strip_prefix(&self, path: &ObjectPath) -> String {
        let path_str = path.to_string();
        if self.prefix.is_empty() {
            path_str
        } else {
            let prefix_with_slash = format!("{}/", self.prefix);
            path_str
                .strip_prefix(&prefix_with_slash)
                .map(str::to_string)
                .unwrap_or(path_str)
        }
    }

    /// Directory part of a key prefix; `object_store` lists by whole path segments
    fn list_root(&self, prefix: &str) -> Option<ObjectPath> {
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let full = match (self.prefix.is_empty(), dir.is_empty()) {
            (true, true) => return None,
            (true, false) => dir.to_string(),
            (false, true) => self.prefix.clone(),
            (false, false) => format!("{}/{}", self.prefix, dir),
        };
        Some(ObjectPath::from(full))
    }

    fn map_error(err: object_store::Error) -> IoError {
        match &err {
            object_store::Error::NotFound { .. } => IoError::new(ErrorKind::NotFound, err.to_string()),
            object_store::Error::AlreadyExists { .. } => {
                IoError::new(ErrorKind::AlreadyExists, err.to_string())
            }
            object_store::Error::Precondition { .. } => {
                IoError::new(ErrorKind::InvalidInput, err.to_string())
            }
            object_store::Error::NotSupported { .. }
            | object_store::Error::NotImplemented => {
                IoError::new(ErrorKind::Unsupported, err.to_string())
            }
            _ => IoError::new(ErrorKind::Other, err.to_string()),
        }
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ObjectStore for S3ObjectStore {
    fn put<'a>(&'a self, key: &'a str, data: &'a [u8]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.full_path(key);
            self.store
                .put(&path, bytes::Bytes::copy_from_slice(data).into())
                .await
                .map_err(Self::map_error)?;
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move {
            let path = self.full_path(key);
            let result = self.store.get(&path).await.map_err(Self::map_error)?;
            let data = result.bytes().await.map_err(Self::map_error)?;
            Ok(data.to_vec())
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            let path = self.full_path(key);
            match self.store.head(&path).await {
                Ok(_) => Ok(true),
                Err(object_store::Error::NotFound { .. }) => Ok(false),
                Err(e) => Err(Self::map_error(e)),
            }
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> StoreFuture<'a, ListResult> {
        Box::pin(async move {
            let root = self.list_root(prefix);
            let full_prefix = self.full_key(prefix);

            let stream = match continuation_token {
                Some(after) => {
                    let offset = self.full_path(after);
                    self.store.list_with_offset(root.as_ref(), &offset)
                }
                None => self.store.list(root.as_ref()),
            };

            // Segment-level listing may include siblings such as `validator_10`
            // under a `validator_1` prefix; filter on the raw key prefix.
            let metas: Vec<object_store::ObjectMeta> = stream
                .try_filter(|meta| {
                    let keep = meta.location.as_ref().starts_with(full_prefix.as_str());
                    futures::future::ready(keep)
                })
                .take(LIST_PAGE_SIZE + 1)
                .try_collect()
                .await
                .map_err(Self::map_error)?;

            let has_more = metas.len() > LIST_PAGE_SIZE;
            let mut objects: Vec<ObjectMeta> = metas
                .into_iter()
                .take(LIST_PAGE_SIZE)
                .map(|meta| ObjectMeta {
                    key: self.strip_prefix(&meta.location),
                    size_bytes: meta.size as u64,
                    modified_at_ms: meta.last_modified.timestamp_millis().try_into().unwrap_or(0),
                })
                .collect();
            objects.sort_by(|a, b| a.key.cmp(&b.key));

            let continuation_token = if has_more {
                objects.last().map(|o| o.key.clone())
            } else {
                None
            };

            Ok(ListResult {
                objects,
                continuation_token,
            })
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let root = if self.prefix.is_empty() {
                None
            } else {
                Some(ObjectPath::from(self.prefix.as_str()))
            };
            self.store
                .list_with_delimiter(root.as_ref())
                .await
                .map_err(Self::map_error)?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn memory_backed(prefix: &str) -> S3ObjectStore {
        S3ObjectStore::from_store(Arc::new(InMemory::new()), prefix)
    }

    #[test]
    fn test_full_key_with_prefix() {
        let store = memory_backed("logs/");
        assert_eq!(store.full_key("validator_1/config.json"), "logs/validator_1/config.json");
        assert_eq!(
            store.strip_prefix(&ObjectPath::from("logs/validator_1/config.json")),
            "validator_1/config.json"
        );
    }

    #[test]
    fn test_list_root() {
        let store = memory_backed("");
        assert_eq!(store.list_root(""), None);
        assert_eq!(store.list_root("validator_1"), None);
        assert_eq!(
            store.list_root("validator_1/run/entries/").map(|p| p.to_string()),
            Some("validator_1/run/entries".to_string())
        );

        let prefixed = memory_backed("logs");
        assert_eq!(
            prefixed.list_root("validator_1/").map(|p| p.to_string()),
            Some("logs/validator_1".to_string())
        );
    }

    #[tokio::test]
    async fn test_put_get_exists() {
        let store = memory_backed("logs");
        store.put("validator_1/r/config.json", b"{}").await.unwrap();

        assert_eq!(store.get("validator_1/r/config.json").await.unwrap(), b"{}");
        assert!(store.exists("validator_1/r/config.json").await.unwrap());
        assert!(!store.exists("validator_1/r/_finished").await.unwrap());

        let err = store.get("validator_1/r/_finished").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_list_filters_sibling_prefixes() {
        let store = memory_backed("");
        store.put("validator_1/a/config.json", b"1").await.unwrap();
        store.put("validator_10/a/config.json", b"2").await.unwrap();

        let result = store.list("validator_1/", None).await.unwrap();
        let keys: Vec<_> = result.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["validator_1/a/config.json"]);

        let all = store.list("validator_1", None).await.unwrap();
        assert_eq!(all.objects.len(), 2);
    }

    #[tokio::test]
    async fn test_run_round_trips_through_object_paths() {
        use crate::logs::{LogReader, LogRecord, LogStoreError, LogWriter, Payload, RunId};
        use crate::storage::config::LogStoreConfig;

        let store = memory_backed("logs");
        let config = LogStoreConfig::test();
        let run_id = RunId::new("v1.2_retry-3").unwrap();

        let writer = LogWriter::new(1, store.clone(), &config);
        writer
            .init_run_with_id(run_id.clone(), Payload::new(), "v1")
            .await
            .unwrap();
        writer.log(Payload::new(), Some(0)).await.unwrap();
        writer.log_stdout("started", "INFO").await.unwrap();
        writer.finish().await.unwrap();

        let reader = LogReader::new(store.clone(), &config);
        assert_eq!(reader.get_runs(1).await.unwrap(), vec![run_id.clone()]);
        let run_config = reader.get_run_config(1, Some(&run_id)).await.unwrap().unwrap();
        assert_eq!(run_config["version_tag"], "v1");

        let logs = reader.fetch_logs(1, Some(&run_id), None, 10).await.unwrap();
        assert_eq!(logs.run_id, run_id);
        assert_eq!(logs.records.len(), 2);
        assert!(matches!(logs.records[0], LogRecord::Entry(_)));
        assert!(reader.run_status(1, None).await.unwrap().finished);

        // Ids the path layer would escape never reach the store
        let err = RunId::new("run#1").unwrap_err();
        assert!(matches!(err, LogStoreError::InvalidRunId { .. }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let store = memory_backed("");
        assert!(store.health_check().await.is_ok());
    }
}
