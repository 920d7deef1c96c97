//! Object Store Abstraction
//!
//! The narrow slice of an S3-compatible API the log engine needs: PUT, GET,
//! EXISTS, prefix LIST, and a reachability probe. Every store instance is
//! bound to one bucket (or one local root directory).
//!
//! Implementations:
//! - `InMemoryObjectStore`: For unit tests and DST
//! - `LocalFsObjectStore`: For development and local testing
//! - `S3ObjectStore`: For production (feature `s3`)
//!
//! Absence is reported as `ErrorKind::NotFound`; timeouts as `ErrorKind::TimedOut`.
//! LIST returns keys in ascending byte order, which the key scheme relies on.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

/// Extension of in-flight LocalFs writes, never listed
const PARTIAL_EXTENSION: &str = "partial";

/// Boxed future returned by every store operation
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = IoResult<T>> + Send + 'a>>;

/// Metadata for a stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object key (path)
    pub key: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Last-modified timestamp (Unix ms)
    pub modified_at_ms: u64,
}

/// One page of a list operation
#[derive(Debug, Clone, Default)]
pub struct ListResult {
    /// Objects matching the prefix, ascending by key
    pub objects: Vec<ObjectMeta>,
    /// Pass back to `list` to fetch the next page; `None` on the last page
    pub continuation_token: Option<String>,
}

/// Object store abstraction trait
pub trait ObjectStore: Send + Sync + 'static {
    /// Put an object (create or overwrite)
    fn put<'a>(&'a self, key: &'a str, data: &'a [u8]) -> StoreFuture<'a, ()>;

    /// Get an object's contents
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>>;

    /// Check if an object exists
    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool>;

    /// List one page of objects whose key starts with `prefix`.
    ///
    /// The continuation token is the last key of the previous page; the next
    /// page starts strictly after it.
    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> StoreFuture<'a, ListResult>;

    /// Cheap reachability check of the bucket
    fn health_check(&self) -> StoreFuture<'_, ()>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn put<'a>(&'a self, key: &'a str, data: &'a [u8]) -> StoreFuture<'a, ()> {
        (**self).put(key, data)
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        (**self).get(key)
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        (**self).exists(key)
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> StoreFuture<'a, ListResult> {
        (**self).list(prefix, continuation_token)
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        (**self).health_check()
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ============================================================================
// InMemoryObjectStore - For tests and DST
// ============================================================================

/// In-memory object store for unit tests and deterministic simulation
#[derive(Debug, Clone)]
pub struct InMemoryObjectStore {
    data: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    page_size: usize,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified_at_ms: u64,
}

impl InMemoryObjectStore {
    /// S3 returns at most 1000 keys per LIST page
    pub const DEFAULT_PAGE_SIZE: usize = 1000;

    pub fn new() -> Self {
        Self::with_page_size(Self::DEFAULT_PAGE_SIZE)
    }

    /// Small pages exercise the caller's pagination loop
    pub fn with_page_size(page_size: usize) -> Self {
        InMemoryObjectStore {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            page_size: page_size.max(1),
        }
    }

    /// Number of stored objects (for testing)
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// All keys in order (for testing)
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Overwrite raw bytes under a key, bypassing any wrapper (for testing corruption)
    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        self.data.write().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                modified_at_ms: now_ms(),
            },
        );
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put<'a>(&'a self, key: &'a str, data: &'a [u8]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.insert_raw(key, data);
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.data
                .read()
                .get(key)
                .map(|obj| obj.data.clone())
                .ok_or_else(|| IoError::new(ErrorKind::NotFound, format!("Key not found: {}", key)))
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { Ok(self.data.read().contains_key(key)) })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> StoreFuture<'a, ListResult> {
        Box::pin(async move {
            let data = self.data.read();
            let lower = match continuation_token {
                Some(after) if after >= prefix => Bound::Excluded(after.to_string()),
                _ => Bound::Included(prefix.to_string()),
            };

            let mut objects = Vec::new();
            let mut continuation_token = None;
            for (key, obj) in data.range((lower, Bound::Unbounded)) {
                if !key.starts_with(prefix) {
                    break;
                }
                if objects.len() == self.page_size {
                    continuation_token = objects.last().map(|o: &ObjectMeta| o.key.clone());
                    break;
                }
                objects.push(ObjectMeta {
                    key: key.clone(),
                    size_bytes: obj.data.len() as u64,
                    modified_at_ms: obj.modified_at_ms,
                });
            }

            Ok(ListResult {
                objects,
                continuation_token,
            })
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { Ok(()) })
    }
}

// ============================================================================
// LocalFsObjectStore - For development
// ============================================================================

/// Local filesystem object store; keys map to paths under `base_path`
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    base_path: PathBuf,
}

impl LocalFsObjectStore {
    pub fn new(base_path: PathBuf) -> Self {
        LocalFsObjectStore { base_path }
    }

    fn full_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Objects renamed or removed while the walk runs are left out of the
    /// listing rather than failing it
    fn walk_dir(dir: &Path, base: &Path, prefix: &str, objects: &mut Vec<ObjectMeta>) -> IoResult<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let path = entry?.path();

            if path.is_dir() {
                Self::walk_dir(&path, base, prefix, objects)?;
            } else if path.is_file() {
                let Ok(relative) = path.strip_prefix(base) else {
                    continue;
                };
                // Object keys always use '/' regardless of platform
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                let in_flight = path.extension().is_some_and(|e| e == PARTIAL_EXTENSION);
                if key.starts_with(prefix) && !in_flight {
                    objects.extend(Self::stat_object(key, &path)?);
                }
            }
        }
        Ok(())
    }

    fn stat_object(key: String, path: &Path) -> IoResult<Option<ObjectMeta>> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(ObjectMeta {
            key,
            size_bytes: metadata.len(),
            modified_at_ms: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }))
    }
}

impl ObjectStore for LocalFsObjectStore {
    fn put<'a>(&'a self, key: &'a str, data: &'a [u8]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let path = self.full_path(key);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Write-then-rename so readers never observe a half-written object
            let tmp = path.with_extension(PARTIAL_EXTENSION);
            tokio::fs::write(&tmp, data).await?;
            tokio::fs::rename(&tmp, &path).await
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move { tokio::fs::read(self.full_path(key)).await })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move { tokio::fs::try_exists(self.full_path(key)).await })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> StoreFuture<'a, ListResult> {
        Box::pin(async move {
            let base = self.base_path.clone();
            let prefix_owned = prefix.to_string();
            let after = continuation_token.map(str::to_string);

            let objects = tokio::task::spawn_blocking(move || -> IoResult<Vec<ObjectMeta>> {
                // Narrow the walk to the deepest directory named by the prefix
                let search_dir = match prefix_owned.rfind('/') {
                    Some(idx) => base.join(&prefix_owned[..idx]),
                    None => base.clone(),
                };
                if !search_dir.is_dir() {
                    return Ok(Vec::new());
                }

                let mut objects = Vec::new();
                Self::walk_dir(&search_dir, &base, &prefix_owned, &mut objects)?;
                if let Some(after) = after {
                    objects.retain(|o| o.key.as_str() > after.as_str());
                }
                objects.sort_by(|a, b| a.key.cmp(&b.key));
                Ok(objects)
            })
            .await
            .map_err(|e| IoError::new(ErrorKind::Other, e))??;

            Ok(ListResult {
                objects,
                continuation_token: None,
            })
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let metadata = tokio::fs::metadata(&self.base_path).await?;
            if metadata.is_dir() {
                Ok(())
            } else {
                Err(IoError::new(
                    ErrorKind::NotFound,
                    format!("{} is not a directory", self.base_path.display()),
                ))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_inmemory_put_get() {
        let store = InMemoryObjectStore::new();

        store.put("test/key1", b"hello world").await.unwrap();
        let data = store.get("test/key1").await.unwrap();

        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_inmemory_get_missing_is_not_found() {
        let store = InMemoryObjectStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_inmemory_exists() {
        let store = InMemoryObjectStore::new();

        assert!(!store.exists("test/key1").await.unwrap());
        store.put("test/key1", b"data").await.unwrap();
        assert!(store.exists("test/key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_inmemory_list_prefix_sorted() {
        let store = InMemoryObjectStore::new();

        store.put("validator_1/b", b"2").await.unwrap();
        store.put("validator_1/a", b"1").await.unwrap();
        store.put("validator_10/a", b"3").await.unwrap();
        store.put("validator_2/a", b"4").await.unwrap();

        let result = store.list("validator_1/", None).await.unwrap();
        let keys: Vec<_> = result.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["validator_1/a", "validator_1/b"]);
        assert!(result.continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_inmemory_list_pagination() {
        let store = InMemoryObjectStore::with_page_size(2);
        for i in 0..5 {
            store.put(&format!("p/{}", i), b"x").await.unwrap();
        }

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = store.list("p/", token.as_deref()).await.unwrap();
            assert!(page.objects.len() <= 2);
            keys.extend(page.objects.into_iter().map(|o| o.key));
            match page.continuation_token {
                Some(t) => token = Some(t),
                None => break,
            }
        }
        assert_eq!(keys, vec!["p/0", "p/1", "p/2", "p/3", "p/4"]);
    }

    #[tokio::test]
    async fn test_arc_dyn_store_delegates() {
        let store: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new());
        store.put("k", b"v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"v");
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_localfs_put_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsObjectStore::new(dir.path().to_path_buf());

        store.put("test/key1.txt", b"hello world").await.unwrap();
        let data = store.get("test/key1.txt").await.unwrap();

        assert_eq!(data, b"hello world");
        assert!(store.exists("test/key1.txt").await.unwrap());
        assert!(!store.exists("test/nope.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_localfs_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsObjectStore::new(dir.path().to_path_buf());

        store.put("validator_3/run/entries/0000000001.json", b"b").await.unwrap();
        store.put("validator_3/run/entries/0000000000.json", b"a").await.unwrap();
        store.put("validator_3/run/config.json", b"{}").await.unwrap();
        store.put("validator_30/run/config.json", b"{}").await.unwrap();

        let result = store.list("validator_3/run/entries/", None).await.unwrap();
        let keys: Vec<_> = result.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "validator_3/run/entries/0000000000.json",
                "validator_3/run/entries/0000000001.json"
            ]
        );

        let all = store.list("", None).await.unwrap();
        assert_eq!(all.objects.len(), 4);
    }

    #[test]
    fn test_localfs_vanished_objects_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("validator_1/run/entries/0000000000.partial");
        let meta = LocalFsObjectStore::stat_object("k".to_string(), &gone).unwrap();
        assert!(meta.is_none());

        let mut objects = Vec::new();
        LocalFsObjectStore::walk_dir(&dir.path().join("missing"), dir.path(), "", &mut objects)
            .unwrap();
        assert!(objects.is_empty());
    }

    #[tokio::test]
    async fn test_localfs_list_hides_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsObjectStore::new(dir.path().to_path_buf());
        store.put("validator_2/run/config.json", b"{}").await.unwrap();
        std::fs::write(dir.path().join("validator_2/run/_finished.partial"), b"{").unwrap();

        let result = store.list("validator_2/", None).await.unwrap();
        let keys: Vec<_> = result.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["validator_2/run/config.json"]);
    }

    #[tokio::test]
    async fn test_localfs_health_check() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalFsObjectStore::new(dir.path().to_path_buf());
        assert!(store.health_check().await.is_ok());

        let missing = LocalFsObjectStore::new(dir.path().join("nope"));
        assert!(missing.health_check().await.is_err());
    }
}
