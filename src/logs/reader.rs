//! Log Reader
//!
//! Rebuilds ordered, filtered log streams from LIST and GET alone. No index is
//! stored; runs and their objects are rediscovered from key listings on every
//! call.
//!
//! Reads of an open run may miss objects that are written but not yet listed.
//! A run is complete once its `_finished` marker is visible.

use crate::logs::codec;
use crate::logs::error::{LogStoreError, LogStoreResult, StoreOp};
use crate::logs::keys::{self, ParsedKey, RunId, RunObject};
use crate::logs::model::{LogEntry, LogLine, LogRecord, Payload};
use crate::storage::config::{LogStoreConfig, RetryConfig};
use crate::storage::object_store::{ObjectMeta, ObjectStore};
use crate::storage::retry::{with_retry, with_timeout};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Concurrent GETs per fetch
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Result of a fetch: records oldest first, plus objects that could not be decoded
#[derive(Debug, Clone, Serialize)]
pub struct FetchedLogs<T> {
    pub run_id: RunId,
    pub records: Vec<T>,
    /// Keys of corrupt objects that were skipped
    pub skipped_objects: Vec<String>,
}

/// Open/finished state and object counts of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunStatus {
    pub uid: u64,
    pub run_id: RunId,
    pub has_config: bool,
    pub finished: bool,
    pub finished_at: Option<String>,
    pub entries_objects: u64,
    pub stdout_objects: u64,
    pub total_bytes: u64,
}

/// Bucket-wide totals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreMetrics {
    pub total_objects: u64,
    pub total_size_bytes: u64,
    pub total_validators: u64,
}

/// Read-side handle; cheap to share, holds no mutable state
pub struct LogReader<S: ObjectStore> {
    store: S,
    retry: RetryConfig,
    fetch_concurrency: usize,
}

impl<S: ObjectStore> LogReader<S> {
    pub fn new(store: S, config: &LogStoreConfig) -> Self {
        LogReader {
            store,
            retry: config.retry.clone(),
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Every uid with at least one object, ascending. Malformed keys are skipped.
    pub async fn list_validators(&self) -> LogStoreResult<Vec<u64>> {
        let objects = self.list_all("").await?;
        let uids: BTreeSet<u64> = objects
            .iter()
            .filter_map(|meta| {
                let first = meta.key.split('/').next()?;
                let uid = keys::parse_validator_segment(first);
                if uid.is_none() {
                    debug!(key = %meta.key, "Skipping key outside the validator namespace");
                }
                uid
            })
            .collect();
        Ok(uids.into_iter().collect())
    }

    /// Run ids of `uid`, most recent first, without duplicates
    pub async fn get_runs(&self, uid: u64) -> LogStoreResult<Vec<RunId>> {
        let objects = self.list_all(&keys::validator_prefix(uid)).await?;
        let runs: BTreeSet<&str> = objects
            .iter()
            .filter_map(|meta| keys::run_segment(&meta.key))
            .collect();
        runs.into_iter()
            .rev()
            .map(RunId::new)
            .collect::<LogStoreResult<Vec<_>>>()
    }

    /// Greatest run id of `uid`; `NoRunsFound` when there is none
    pub async fn latest_run(&self, uid: u64) -> LogStoreResult<RunId> {
        self.get_runs(uid)
            .await?
            .into_iter()
            .next()
            .ok_or(LogStoreError::NoRunsFound { uid })
    }

    async fn resolve_run(&self, uid: u64, run_id: Option<&RunId>) -> LogStoreResult<RunId> {
        match run_id {
            Some(id) => Ok(id.clone()),
            None => self.latest_run(uid).await,
        }
    }

    /// The run's config document, `None` if it was never written
    pub async fn get_run_config(
        &self,
        uid: u64,
        run_id: Option<&RunId>,
    ) -> LogStoreResult<Option<Payload>> {
        let run_id = self.resolve_run(uid, run_id).await?;
        let key = keys::config_key(uid, &run_id);
        match self.get_object(&key).await? {
            Some(data) => codec::decode_config(&key, &data).map(Some),
            None => Ok(None),
        }
    }

    /// Object counts and finished state from a single listing of the run
    pub async fn run_status(&self, uid: u64, run_id: Option<&RunId>) -> LogStoreResult<RunStatus> {
        let run_id = self.resolve_run(uid, run_id).await?;
        let prefix = keys::run_prefix(uid, &run_id);
        let objects = self.list_all(&prefix).await?;
        if objects.is_empty() {
            return Err(LogStoreError::NotFound { key: prefix });
        }

        let mut status = RunStatus {
            uid,
            run_id: run_id.clone(),
            has_config: false,
            finished: false,
            finished_at: None,
            entries_objects: 0,
            stdout_objects: 0,
            total_bytes: 0,
        };
        for meta in &objects {
            status.total_bytes += meta.size_bytes;
            match keys::parse_key(&meta.key).map(|p| p.object) {
                Some(RunObject::Config) => status.has_config = true,
                Some(RunObject::Entries(_)) => status.entries_objects += 1,
                Some(RunObject::Stdout(_)) => status.stdout_objects += 1,
                Some(RunObject::Finished) => status.finished = true,
                None => {}
            }
        }

        if status.finished {
            let key = keys::finished_key(uid, &run_id);
            if let Some(data) = self.get_object(&key).await? {
                match codec::decode_finished(&key, &data) {
                    Ok(marker) => status.finished_at = Some(marker.finished_at),
                    Err(e) => warn!(key = %key, error = %e, "Unreadable finished marker"),
                }
            }
        }
        Ok(status)
    }

    /// Structured entries ordered by `(step, timestamp)`, filtered, last `limit` kept
    pub async fn fetch_entries(
        &self,
        uid: u64,
        run_id: Option<&RunId>,
        level_filter: Option<&str>,
        limit: usize,
    ) -> LogStoreResult<FetchedLogs<LogEntry>> {
        let run_id = self.resolve_run(uid, run_id).await?;
        let (entries, skipped_objects) = self.read_entries(uid, &run_id).await?;

        let matching: Vec<LogEntry> = entries
            .into_iter()
            .filter(|e| e.matches_level(level_filter))
            .collect();

        Ok(FetchedLogs {
            run_id,
            records: keep_last(matching, limit),
            skipped_objects,
        })
    }

    /// Stdout lines in write order, filtered, last `limit` kept.
    ///
    /// Objects are read newest first and the scan stops once `limit` matching
    /// lines are in hand.
    pub async fn fetch_stdout(
        &self,
        uid: u64,
        run_id: Option<&RunId>,
        level_filter: Option<&str>,
        limit: usize,
    ) -> LogStoreResult<FetchedLogs<LogLine>> {
        let run_id = self.resolve_run(uid, run_id).await?;
        let mut result = FetchedLogs {
            run_id,
            records: Vec::new(),
            skipped_objects: Vec::new(),
        };
        if limit == 0 {
            return Ok(result);
        }

        let keys = self
            .object_keys(&keys::stdout_prefix(uid, &result.run_id), |o| {
                matches!(o, RunObject::Stdout(_))
            })
            .await?;

        // Per-object batches, newest object first
        let mut batches: Vec<Vec<LogLine>> = Vec::new();
        let mut found = 0usize;
        'scan: for chunk in keys.rchunks(self.fetch_concurrency) {
            let fetched = self.fetch_objects(chunk).await?;
            for (key, data) in fetched.into_iter().rev() {
                let Some(data) = data else { continue };
                match codec::decode_lines(&key, &data) {
                    Ok(lines) => {
                        let lines: Vec<LogLine> = lines
                            .into_iter()
                            .filter(|l| l.matches_level(level_filter))
                            .collect();
                        found += lines.len();
                        batches.push(lines);
                        if found >= limit {
                            break 'scan;
                        }
                    }
                    Err(e) => {
                        warn!(key = %key, error = %e, "Skipping corrupt stdout object");
                        result.skipped_objects.push(key);
                    }
                }
            }
        }

        batches.reverse();
        result.skipped_objects.reverse();
        result.records = keep_last(batches.into_iter().flatten().collect(), limit);
        Ok(result)
    }

    /// Entries and stdout lines merged by timestamp, filtered, last `limit` kept.
    ///
    /// Entries keep their `(step, timestamp)` order and lines their write
    /// order; on equal timestamps the entry comes first. With `run_id`
    /// omitted the latest run is used.
    pub async fn fetch_logs(
        &self,
        uid: u64,
        run_id: Option<&RunId>,
        level_filter: Option<&str>,
        limit: usize,
    ) -> LogStoreResult<FetchedLogs<LogRecord>> {
        let run_id = self.resolve_run(uid, run_id).await?;
        let entries = self
            .fetch_entries(uid, Some(&run_id), level_filter, limit)
            .await?;
        // The last `limit` merged records hold at most `limit` lines, all from
        // the tail of the filtered stdout stream
        let lines = self
            .fetch_stdout(uid, Some(&run_id), level_filter, limit)
            .await?;

        let merged = merge_by_timestamp(entries.records, lines.records);
        let mut skipped_objects = entries.skipped_objects;
        skipped_objects.extend(lines.skipped_objects);

        Ok(FetchedLogs {
            run_id,
            records: keep_last(merged, limit),
            skipped_objects,
        })
    }

    /// Object count, bytes and validator count from one full listing
    pub async fn store_metrics(&self) -> LogStoreResult<StoreMetrics> {
        let objects = self.list_all("").await?;
        let validators: BTreeSet<u64> = objects
            .iter()
            .filter_map(|m| keys::parse_validator_segment(m.key.split('/').next()?))
            .collect();
        Ok(StoreMetrics {
            total_objects: objects.len() as u64,
            total_size_bytes: objects.iter().map(|m| m.size_bytes).sum(),
            total_validators: validators.len() as u64,
        })
    }

    /// Single bounded probe of the store; unreachability is `false`, not an error
    pub async fn health_check(&self) -> bool {
        match with_timeout(&self.retry, self.store.health_check()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Store health check failed");
                false
            }
        }
    }

    /// All entries of a run sorted by `(step, timestamp)`, plus skipped keys
    async fn read_entries(
        &self,
        uid: u64,
        run_id: &RunId,
    ) -> LogStoreResult<(Vec<LogEntry>, Vec<String>)> {
        let keys = self
            .object_keys(&keys::entries_prefix(uid, run_id), |o| {
                matches!(o, RunObject::Entries(_))
            })
            .await?;

        let mut entries = Vec::new();
        let mut skipped = Vec::new();
        for (key, data) in self.fetch_objects(&keys).await? {
            let Some(data) = data else { continue };
            match codec::decode_entries(&key, &data) {
                Ok(batch) => entries.extend(batch),
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping corrupt entries object");
                    skipped.push(key);
                }
            }
        }
        // Stable: equal (step, timestamp) keep write order
        entries.sort_by(|a, b| (a.step, &a.timestamp).cmp(&(b.step, &b.timestamp)));
        Ok((entries, skipped))
    }

    /// Keys under `prefix` that parse as the wanted kind of run object, in LIST order
    async fn object_keys(
        &self,
        prefix: &str,
        wanted: impl Fn(RunObject) -> bool,
    ) -> LogStoreResult<Vec<String>> {
        let objects = self.list_all(prefix).await?;
        Ok(objects
            .into_iter()
            .filter(|meta| match keys::parse_key(&meta.key) {
                Some(ParsedKey { object, .. }) => wanted(object),
                None => {
                    debug!(key = %meta.key, "Skipping unrecognized object");
                    false
                }
            })
            .map(|meta| meta.key)
            .collect())
    }

    /// GET each key with bounded concurrency, preserving input order.
    ///
    /// Objects that vanished between LIST and GET come back as `None`.
    async fn fetch_objects(&self, keys: &[String]) -> LogStoreResult<Vec<(String, Option<Vec<u8>>)>> {
        stream::iter(keys.iter().cloned())
            .map(|key| async move {
                let data = self.get_object(&key).await?;
                Ok::<_, LogStoreError>((key, data))
            })
            .buffered(self.fetch_concurrency)
            .try_collect()
            .await
    }

    /// GET with retry; absence is `None`
    async fn get_object(&self, key: &str) -> LogStoreResult<Option<Vec<u8>>> {
        match with_retry(&self.retry, StoreOp::Get, key, || self.store.get(key)).await {
            Ok(data) => Ok(Some(data)),
            Err(LogStoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Follow continuation tokens until the listing is exhausted
    async fn list_all(&self, prefix: &str) -> LogStoreResult<Vec<ObjectMeta>> {
        let mut objects = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = with_retry(&self.retry, StoreOp::List, prefix, || {
                self.store.list(prefix, token.as_deref())
            })
            .await;
            let page = match page {
                Ok(page) => page,
                Err(LogStoreError::NotFound { .. }) => break,
                Err(e) => return Err(e),
            };
            objects.extend(page.objects);
            match page.continuation_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(objects)
    }
}

fn keep_last<T>(mut records: Vec<T>, limit: usize) -> Vec<T> {
    if records.len() > limit {
        records.drain(..records.len() - limit);
    }
    records
}

/// Two-way merge on timestamp; each side keeps its own order
fn merge_by_timestamp(entries: Vec<LogEntry>, lines: Vec<LogLine>) -> Vec<LogRecord> {
    let mut merged = Vec::with_capacity(entries.len() + lines.len());
    let mut entries = entries.into_iter().peekable();
    let mut lines = lines.into_iter().peekable();
    loop {
        let take_entry = match (entries.peek(), lines.peek()) {
            (Some(e), Some(l)) => e.timestamp <= l.timestamp,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let record = if take_entry {
            entries.next().map(LogRecord::Entry)
        } else {
            lines.next().map(LogRecord::Line)
        };
        merged.extend(record);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::codec::{encode_entries, encode_lines};
    use crate::logs::model::LogLevel;
    use crate::storage::object_store::InMemoryObjectStore;
    use serde_json::json;

    fn reader(store: &InMemoryObjectStore) -> LogReader<InMemoryObjectStore> {
        LogReader::new(store.clone(), &LogStoreConfig::test())
    }

    fn run(id: &str) -> RunId {
        RunId::new(id).unwrap()
    }

    fn entry(step: u64, ts: &str, level: Option<&str>) -> LogEntry {
        let mut payload = Payload::new();
        payload.insert("step_seen".to_string(), json!(step));
        if let Some(level) = level {
            payload.insert("level".to_string(), json!(level));
        }
        LogEntry {
            step,
            timestamp: ts.to_string(),
            payload,
        }
    }

    fn line(ts: &str, level: LogLevel, message: &str) -> LogLine {
        LogLine {
            timestamp: ts.to_string(),
            level,
            message: message.to_string(),
        }
    }

    async fn put_entries(store: &InMemoryObjectStore, uid: u64, r: &RunId, seq: u64, batch: &[LogEntry]) {
        store
            .put(&keys::entries_key(uid, r, seq), &encode_entries(batch).unwrap())
            .await
            .unwrap();
    }

    async fn put_lines(store: &InMemoryObjectStore, uid: u64, r: &RunId, seq: u64, batch: &[LogLine]) {
        store
            .put(&keys::stdout_key(uid, r, seq), &encode_lines(batch).unwrap())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_validators_skips_malformed() {
        let store = InMemoryObjectStore::new();
        for key in [
            "validator_10/r/config.json",
            "validator_2/r/config.json",
            "validator_2/s/config.json",
            "validator_02/r/config.json",
            "validator_abc/r/config.json",
            "random.txt",
        ] {
            store.put(key, b"{}").await.unwrap();
        }
        assert_eq!(reader(&store).list_validators().await.unwrap(), vec![2, 10]);
    }

    #[tokio::test]
    async fn test_get_runs_descending_and_paginated() {
        let store = InMemoryObjectStore::with_page_size(3);
        for r in ["20240101T000000000Z-a", "20240301T000000000Z-b", "20240201T000000000Z-c"] {
            store.put(&format!("validator_5/{}/config.json", r), b"{}").await.unwrap();
            store.put(&format!("validator_5/{}/_finished", r), b"{}").await.unwrap();
        }
        store.put("validator_50/zzz/config.json", b"{}").await.unwrap();

        let r = reader(&store);
        let runs = r.get_runs(5).await.unwrap();
        let ids: Vec<&str> = runs.iter().map(RunId::as_str).collect();
        assert_eq!(
            ids,
            vec!["20240301T000000000Z-b", "20240201T000000000Z-c", "20240101T000000000Z-a"]
        );
        assert_eq!(r.get_runs(5).await.unwrap(), runs);
        assert_eq!(r.latest_run(5).await.unwrap().as_str(), "20240301T000000000Z-b");
        assert!(r.get_runs(6).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_config_absent_is_none() {
        let store = InMemoryObjectStore::new();
        let r = reader(&store);
        let id = run("r1");
        assert_eq!(r.get_run_config(1, Some(&id)).await.unwrap(), None);

        store
            .put(&keys::config_key(1, &id), br#"{"x": 1}"#)
            .await
            .unwrap();
        let config = r.get_run_config(1, None).await.unwrap().unwrap();
        assert_eq!(config["x"], 1);
    }

    #[tokio::test]
    async fn test_no_runs_found() {
        let store = InMemoryObjectStore::new();
        let r = reader(&store);
        assert!(matches!(
            r.fetch_logs(9, None, None, 10).await.unwrap_err(),
            LogStoreError::NoRunsFound { uid: 9 }
        ));
        assert!(matches!(
            r.get_run_config(9, None).await.unwrap_err(),
            LogStoreError::NoRunsFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_level_filter_then_limit() {
        let store = InMemoryObjectStore::new();
        let id = run("r");
        put_entries(
            &store,
            1,
            &id,
            0,
            &[entry(0, "t0", Some("INFO")), entry(1, "t1", Some("ERROR"))],
        )
        .await;
        put_entries(&store, 1, &id, 1, &[entry(2, "t2", Some("INFO"))]).await;

        let r = reader(&store);
        let errors = r.fetch_logs(1, Some(&id), Some("error"), 10).await.unwrap();
        assert_eq!(errors.records.len(), 1);
        assert_eq!(errors.records[0].as_entry().unwrap().step, 1);

        let infos = r.fetch_logs(1, Some(&id), Some("INFO"), 1).await.unwrap();
        assert_eq!(infos.records.len(), 1);
        assert_eq!(infos.records[0].as_entry().unwrap().step, 2);
    }

    #[tokio::test]
    async fn test_entries_sorted_by_step() {
        let store = InMemoryObjectStore::new();
        let id = run("r");
        put_entries(&store, 1, &id, 0, &[entry(5, "t5", None), entry(1, "t1", None)]).await;
        put_entries(&store, 1, &id, 1, &[entry(3, "t3", None)]).await;

        let fetched = reader(&store).fetch_entries(1, Some(&id), None, 10).await.unwrap();
        let steps: Vec<u64> = fetched.records.iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![1, 3, 5]);
    }

    #[tokio::test]
    async fn test_corrupt_object_skipped() {
        let store = InMemoryObjectStore::new();
        let id = run("r");
        put_entries(&store, 1, &id, 0, &[entry(0, "t0", None)]).await;
        store
            .put(&keys::entries_key(1, &id, 1), b"[{\"step\":1,\"timest")
            .await
            .unwrap();
        put_entries(&store, 1, &id, 2, &[entry(2, "t2", None)]).await;

        let fetched = reader(&store).fetch_logs(1, Some(&id), None, 10).await.unwrap();
        assert_eq!(fetched.records.len(), 2);
        assert_eq!(fetched.skipped_objects, vec![keys::entries_key(1, &id, 1)]);
    }

    #[tokio::test]
    async fn test_stdout_tail_scan_stops_early() {
        let store = InMemoryObjectStore::new();
        let id = run("r");
        for seq in 0..20u64 {
            let ts = format!("t{:03}", seq);
            put_lines(&store, 1, &id, seq, &[line(&ts, LogLevel::Info, &format!("m{}", seq))]).await;
        }
        // Corrupt an old object; a short tail scan never reaches it
        store
            .put(&keys::stdout_key(1, &id, 0), b"not json\n")
            .await
            .unwrap();

        let r = reader(&store).with_fetch_concurrency(2);
        let tail = r.fetch_stdout(1, Some(&id), None, 3).await.unwrap();
        let messages: Vec<&str> = tail.records.iter().map(|l| l.message.as_str()).collect();
        assert_eq!(messages, vec!["m17", "m18", "m19"]);
        assert!(tail.skipped_objects.is_empty());

        let all = r.fetch_stdout(1, Some(&id), None, 100).await.unwrap();
        assert_eq!(all.records.len(), 19);
        assert_eq!(all.skipped_objects, vec![keys::stdout_key(1, &id, 0)]);
    }

    #[tokio::test]
    async fn test_merge_entries_and_lines() {
        let store = InMemoryObjectStore::new();
        let id = run("r");
        put_entries(
            &store,
            1,
            &id,
            0,
            &[entry(0, "2024-01-01T00:00:01.000Z", None), entry(1, "2024-01-01T00:00:03.000Z", None)],
        )
        .await;
        put_lines(
            &store,
            1,
            &id,
            0,
            &[
                line("2024-01-01T00:00:01.000Z", LogLevel::Info, "tie"),
                line("2024-01-01T00:00:02.000Z", LogLevel::Error, "middle"),
            ],
        )
        .await;

        let fetched = reader(&store).fetch_logs(1, Some(&id), None, 10).await.unwrap();
        let kinds: Vec<&str> = fetched
            .records
            .iter()
            .map(|r| match r {
                LogRecord::Entry(_) => "entry",
                LogRecord::Line(_) => "line",
            })
            .collect();
        assert_eq!(kinds, vec!["entry", "line", "line", "entry"]);

        let last_two = reader(&store).fetch_logs(1, Some(&id), None, 2).await.unwrap();
        assert_eq!(last_two.records.len(), 2);
        assert_eq!(last_two.records[0].as_line().unwrap().message, "middle");
    }

    #[tokio::test]
    async fn test_run_status() {
        let store = InMemoryObjectStore::new();
        let id = run("r");
        store.put(&keys::config_key(2, &id), b"{}").await.unwrap();
        put_entries(&store, 2, &id, 0, &[entry(0, "t", None)]).await;
        put_lines(&store, 2, &id, 0, &[line("t", LogLevel::Info, "x")]).await;

        let r = reader(&store);
        let open = r.run_status(2, Some(&id)).await.unwrap();
        assert!(open.has_config);
        assert!(!open.finished);
        assert_eq!(open.entries_objects, 1);
        assert_eq!(open.stdout_objects, 1);

        store
            .put(&keys::finished_key(2, &id), br#"{"finished_at":"2024-01-01T00:00:00.000Z"}"#)
            .await
            .unwrap();
        let done = r.run_status(2, None).await.unwrap();
        assert!(done.finished);
        assert_eq!(done.finished_at.as_deref(), Some("2024-01-01T00:00:00.000Z"));

        assert!(r.run_status(2, Some(&run("missing"))).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_store_metrics_and_health() {
        let store = InMemoryObjectStore::new();
        store.put("validator_1/r/config.json", b"1234").await.unwrap();
        store.put("validator_2/r/config.json", b"12").await.unwrap();
        store.put("stray", b"1").await.unwrap();

        let r = reader(&store);
        let metrics = r.store_metrics().await.unwrap();
        assert_eq!(
            metrics,
            StoreMetrics {
                total_objects: 3,
                total_size_bytes: 7,
                total_validators: 2,
            }
        );
        assert!(r.health_check().await);
    }

    #[tokio::test]
    async fn test_health_check_unreachable_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::storage::object_store::LocalFsObjectStore::new(dir.path().join("gone"));
        let r = LogReader::new(store, &LogStoreConfig::test());
        assert!(!r.health_check().await);
    }

    #[test]
    fn test_keep_last() {
        assert_eq!(keep_last(vec![1, 2, 3, 4], 2), vec![3, 4]);
        assert_eq!(keep_last(vec![1, 2], 5), vec![1, 2]);
        assert!(keep_last(vec![1, 2], 0).is_empty());
    }
}
