//! Log Writer
//!
//! One `LogWriter` per validator process and run. It owns the sequence
//! counters, the two batch buffers and a handle to the shared store.
//!
//! ## Flush discipline
//!
//! Each buffer sits behind its own async mutex, and a flush runs while that
//! mutex is held, so at most one flush per stream is in flight. A batch is
//! removed from its buffer only after its PUT is acknowledged. A failed batch
//! keeps its sequence number; the next flush rewrites the same key, so a PUT
//! that was applied but not acknowledged can never surface as a duplicate
//! object.
//!
//! Lock order is entries, then stdout, then run state.

use crate::io::production::ProductionRng;
use crate::io::Rng;
use crate::logs::codec;
use crate::logs::error::{LogStoreError, LogStoreResult, StoreOp};
use crate::logs::keys::{self, RunId, SEQ_MAX};
use crate::logs::model::{
    FinishedMarker, LogEntry, LogLevel, LogLine, Payload, RESERVED_STEP, RESERVED_TIMESTAMP,
};
use crate::storage::clock::{LogClock, LogTimestamp, ProductionClock};
use crate::storage::config::{LogStoreConfig, RetryConfig, WriterConfig};
use crate::storage::object_store::ObjectStore;
use crate::storage::retry::with_retry;
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

/// Lifecycle of the writer's run
#[derive(Debug, Clone, PartialEq, Eq)]
enum RunState {
    Idle,
    Open(RunId),
    Finished(RunId),
    Released(Option<RunId>),
}

impl RunState {
    fn run_id(&self) -> Option<&RunId> {
        match self {
            RunState::Idle | RunState::Released(None) => None,
            RunState::Open(id) | RunState::Finished(id) | RunState::Released(Some(id)) => Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Entries,
    Stdout,
}

impl Stream {
    fn key(self, uid: u64, run_id: &RunId, seq: u64) -> String {
        match self {
            Stream::Entries => keys::entries_key(uid, run_id, seq),
            Stream::Stdout => keys::stdout_key(uid, run_id, seq),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Stream::Entries => keys::ENTRIES_DIR,
            Stream::Stdout => keys::STDOUT_DIR,
        }
    }
}

/// Records waiting for their PUT, plus the sequence number they will be stored under
struct BatchBuffer<T> {
    pending: Vec<T>,
    next_seq: u64,
    oldest_at: Option<LogTimestamp>,
}

impl<T> BatchBuffer<T> {
    fn new() -> Self {
        BatchBuffer {
            pending: Vec::new(),
            next_seq: 0,
            oldest_at: None,
        }
    }

    fn push(&mut self, record: T, now: LogTimestamp) {
        if self.pending.is_empty() {
            self.oldest_at = Some(now);
        }
        self.pending.push(record);
    }

    fn is_due<C: LogClock>(&self, clock: &C, config: &WriterConfig) -> bool {
        if self.pending.len() >= config.max_batch_entries {
            return true;
        }
        self.oldest_at
            .is_some_and(|since| clock.has_elapsed(since, config.flush_interval))
    }

    fn reset(&mut self) {
        self.pending.clear();
        self.next_seq = 0;
        self.oldest_at = None;
    }
}

#[derive(Debug, Default)]
struct Counters {
    entries_logged: AtomicU64,
    lines_logged: AtomicU64,
    entries_flushed: AtomicU64,
    lines_flushed: AtomicU64,
    objects_written: AtomicU64,
    failed_flushes: AtomicU64,
    records_dropped: AtomicU64,
}

/// Snapshot of writer activity
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct WriterStats {
    pub entries_logged: u64,
    pub lines_logged: u64,
    pub entries_flushed: u64,
    pub lines_flushed: u64,
    pub objects_written: u64,
    pub failed_flushes: u64,
    /// Records discarded by `cleanup` after a failed final flush
    pub records_dropped: u64,
}

impl WriterStats {
    pub fn pending(&self) -> u64 {
        (self.entries_logged + self.lines_logged)
            .saturating_sub(self.entries_flushed + self.lines_flushed + self.records_dropped)
    }
}

/// Append-side handle for one validator's run
pub struct LogWriter<S: ObjectStore, C: LogClock = ProductionClock> {
    uid: u64,
    store: S,
    clock: C,
    config: WriterConfig,
    retry: RetryConfig,
    state: parking_lot::Mutex<RunState>,
    entries: AsyncMutex<BatchBuffer<LogEntry>>,
    stdout: AsyncMutex<BatchBuffer<LogLine>>,
    next_step: AtomicU64,
    counters: Counters,
}

impl<S: ObjectStore> LogWriter<S, ProductionClock> {
    pub fn new(uid: u64, store: S, config: &LogStoreConfig) -> Self {
        Self::with_clock(uid, store, ProductionClock::new(), config)
    }
}

impl<S: ObjectStore, C: LogClock> LogWriter<S, C> {
    pub fn with_clock(uid: u64, store: S, clock: C, config: &LogStoreConfig) -> Self {
        LogWriter {
            uid,
            store,
            clock,
            config: config.writer.clone(),
            retry: config.retry.clone(),
            state: parking_lot::Mutex::new(RunState::Idle),
            entries: AsyncMutex::new(BatchBuffer::new()),
            stdout: AsyncMutex::new(BatchBuffer::new()),
            next_step: AtomicU64::new(0),
            counters: Counters::default(),
        }
    }

    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn run_id(&self) -> Option<RunId> {
        self.state.lock().run_id().cloned()
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.lock(), RunState::Open(_))
    }

    pub fn stats(&self) -> WriterStats {
        let c = &self.counters;
        WriterStats {
            entries_logged: c.entries_logged.load(Ordering::Relaxed),
            lines_logged: c.lines_logged.load(Ordering::Relaxed),
            entries_flushed: c.entries_flushed.load(Ordering::Relaxed),
            lines_flushed: c.lines_flushed.load(Ordering::Relaxed),
            objects_written: c.objects_written.load(Ordering::Relaxed),
            failed_flushes: c.failed_flushes.load(Ordering::Relaxed),
            records_dropped: c.records_dropped.load(Ordering::Relaxed),
        }
    }

    /// Start a run under a freshly generated, time-ordered run id
    pub async fn init_run(&self, config: Payload, version_tag: &str) -> LogStoreResult<RunId> {
        let entropy = ProductionRng::new().next_u64() as u32;
        let run_id = RunId::generate(self.clock.now(), entropy);
        self.init_run_with_id(run_id, config, version_tag).await
    }

    /// Start a run under a caller-chosen id.
    ///
    /// Writes `config.json` with `version_tag` and `start_time` injected. Fails
    /// with `AlreadyInitialized` if this writer already started a run or the
    /// run's config object already exists.
    pub async fn init_run_with_id(
        &self,
        run_id: RunId,
        mut config: Payload,
        version_tag: &str,
    ) -> LogStoreResult<RunId> {
        let mut entries = self.entries.lock().await;
        let mut stdout = self.stdout.lock().await;

        let current = self.state.lock().clone();
        if current != RunState::Idle {
            return Err(LogStoreError::AlreadyInitialized {
                run_id: current
                    .run_id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "(released)".to_string()),
            });
        }

        let key = keys::config_key(self.uid, &run_id);
        let exists = with_retry(&self.retry, StoreOp::Exists, &key, || self.store.exists(&key))
            .await?;
        if exists {
            return Err(LogStoreError::AlreadyInitialized {
                run_id: run_id.to_string(),
            });
        }

        config.insert("version_tag".to_string(), Value::from(version_tag));
        config.insert(
            "start_time".to_string(),
            Value::from(self.clock.now().to_iso8601()),
        );
        let data = codec::encode_config(&config)?;
        with_retry(&self.retry, StoreOp::Put, &key, || self.store.put(&key, &data)).await?;

        entries.reset();
        stdout.reset();
        self.next_step.store(0, Ordering::SeqCst);
        *self.state.lock() = RunState::Open(run_id.clone());

        info!(uid = self.uid, run_id = %run_id, version_tag, "Run initialized");
        Ok(run_id)
    }

    /// Append a structured entry.
    ///
    /// The step is `step` if given, else the payload's `step` field, else the
    /// internal counter. A returned storage error comes from a threshold
    /// flush: the entry itself is buffered and will go out with the next
    /// flush, so callers retry with `flush()` rather than logging again.
    pub async fn log(&self, payload: Payload, step: Option<u64>) -> LogStoreResult<u64> {
        let payload_step = validate_payload(&payload)?;
        let mut buf = self.entries.lock().await;
        let run_id = self.open_run()?;

        let step = match step.or(payload_step) {
            Some(explicit) => {
                self.next_step
                    .fetch_max(explicit.saturating_add(1), Ordering::SeqCst);
                explicit
            }
            None => self.next_step.fetch_add(1, Ordering::SeqCst),
        };
        let now = self.clock.now();
        let timestamp = payload
            .get(RESERVED_TIMESTAMP)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| now.to_iso8601());

        buf.push(
            LogEntry {
                step,
                timestamp,
                payload,
            },
            now,
        );
        self.counters.entries_logged.fetch_add(1, Ordering::Relaxed);

        if buf.is_due(&self.clock, &self.config) {
            self.flush_buffer(&mut buf, &run_id, Stream::Entries, codec::encode_entries)
                .await?;
        }
        Ok(step)
    }

    /// Append a human-readable line to the stdout stream
    pub async fn log_stdout(
        &self,
        message: impl Into<String>,
        level: impl Into<LogLevel>,
    ) -> LogStoreResult<()> {
        let mut buf = self.stdout.lock().await;
        let run_id = self.open_run()?;

        let now = self.clock.now();
        buf.push(
            LogLine {
                timestamp: now.to_iso8601(),
                level: level.into(),
                message: message.into(),
            },
            now,
        );
        self.counters.lines_logged.fetch_add(1, Ordering::Relaxed);

        if buf.is_due(&self.clock, &self.config) {
            self.flush_buffer(&mut buf, &run_id, Stream::Stdout, codec::encode_lines)
                .await?;
        }
        Ok(())
    }

    /// Write out everything buffered. A no-op when no run is open.
    pub async fn flush(&self) -> LogStoreResult<()> {
        let mut entries = self.entries.lock().await;
        let mut stdout = self.stdout.lock().await;
        let Some(run_id) = self.open_run().ok() else {
            return Ok(());
        };
        self.flush_buffer(&mut entries, &run_id, Stream::Entries, codec::encode_entries)
            .await?;
        self.flush_buffer(&mut stdout, &run_id, Stream::Stdout, codec::encode_lines)
            .await?;
        Ok(())
    }

    /// Flush both streams, write the finished marker and close the run.
    ///
    /// On a storage error the run stays open and `finish` may be retried.
    pub async fn finish(&self) -> LogStoreResult<()> {
        let mut entries = self.entries.lock().await;
        let mut stdout = self.stdout.lock().await;
        let run_id = self.open_run()?;

        self.flush_buffer(&mut entries, &run_id, Stream::Entries, codec::encode_entries)
            .await?;
        self.flush_buffer(&mut stdout, &run_id, Stream::Stdout, codec::encode_lines)
            .await?;

        let key = keys::finished_key(self.uid, &run_id);
        let marker = FinishedMarker {
            finished_at: self.clock.now().to_iso8601(),
        };
        let data = codec::encode_finished(&marker)?;
        with_retry(&self.retry, StoreOp::Put, &key, || self.store.put(&key, &data)).await?;

        *self.state.lock() = RunState::Finished(run_id.clone());
        info!(
            uid = self.uid,
            run_id = %run_id,
            entries = entries.next_seq,
            stdout = stdout.next_seq,
            "Run finished"
        );
        Ok(())
    }

    /// Best-effort flush, then release. Never fails and is safe to repeat.
    ///
    /// Does not write the finished marker; a run cleaned up without `finish`
    /// stays open to readers.
    pub async fn cleanup(&self) {
        let mut entries = self.entries.lock().await;
        let mut stdout = self.stdout.lock().await;

        let state = self.state.lock().clone();
        let run_id = match state {
            RunState::Released(_) => return,
            RunState::Idle => None,
            RunState::Finished(id) => Some(id),
            RunState::Open(id) => {
                if let Err(e) = self
                    .flush_buffer(&mut entries, &id, Stream::Entries, codec::encode_entries)
                    .await
                {
                    warn!(uid = self.uid, run_id = %id, error = %e, "Cleanup could not flush entries");
                }
                if let Err(e) = self
                    .flush_buffer(&mut stdout, &id, Stream::Stdout, codec::encode_lines)
                    .await
                {
                    warn!(uid = self.uid, run_id = %id, error = %e, "Cleanup could not flush stdout");
                }
                Some(id)
            }
        };

        let dropped = (entries.pending.len() + stdout.pending.len()) as u64;
        if dropped > 0 {
            self.counters
                .records_dropped
                .fetch_add(dropped, Ordering::Relaxed);
            warn!(uid = self.uid, dropped, "Cleanup discarded unflushed records");
        }
        entries.pending.clear();
        stdout.pending.clear();

        debug!(uid = self.uid, "Writer released");
        *self.state.lock() = RunState::Released(run_id);
    }

    /// Run `body` inside an initialized run, finishing it on success and
    /// releasing the writer on every path.
    pub async fn scoped<'a, F, Fut, T>(
        &'a self,
        config: Payload,
        version_tag: &str,
        body: F,
    ) -> LogStoreResult<T>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = LogStoreResult<T>> + 'a,
    {
        if let Err(e) = self.init_run(config, version_tag).await {
            self.cleanup().await;
            return Err(e);
        }
        let outcome = body(self).await;
        let finished = match outcome {
            Ok(_) => self.finish().await,
            Err(_) => Ok(()),
        };
        self.cleanup().await;
        let value = outcome?;
        finished?;
        Ok(value)
    }

    fn open_run(&self) -> LogStoreResult<RunId> {
        match &*self.state.lock() {
            RunState::Open(id) => Ok(id.clone()),
            RunState::Finished(id) | RunState::Released(Some(id)) => Err(LogStoreError::RunClosed {
                run_id: id.to_string(),
            }),
            RunState::Idle | RunState::Released(None) => {
                Err(LogStoreError::RunNotInitialized { uid: self.uid })
            }
        }
    }

    /// PUT pending records in batches of at most `max_batch_entries`.
    ///
    /// Caller holds the buffer's mutex. Returns the number of records written.
    async fn flush_buffer<T>(
        &self,
        buf: &mut BatchBuffer<T>,
        run_id: &RunId,
        stream: Stream,
        encode: fn(&[T]) -> LogStoreResult<Vec<u8>>,
    ) -> LogStoreResult<usize> {
        let mut written = 0;
        while !buf.pending.is_empty() {
            if buf.next_seq > SEQ_MAX {
                return Err(LogStoreError::SequenceExhausted {
                    stream: format!("{}{}", keys::run_prefix(self.uid, run_id), stream.name()),
                });
            }
            let n = buf.pending.len().min(self.config.max_batch_entries.max(1));
            let key = stream.key(self.uid, run_id, buf.next_seq);
            let data = encode(&buf.pending[..n])?;

            let result =
                with_retry(&self.retry, StoreOp::Put, &key, || self.store.put(&key, &data)).await;
            if let Err(e) = result {
                self.counters.failed_flushes.fetch_add(1, Ordering::Relaxed);
                warn!(
                    uid = self.uid,
                    key = %key,
                    records = n,
                    error = %e,
                    "Flush failed, batch kept for retry"
                );
                return Err(e);
            }

            buf.pending.drain(..n);
            buf.next_seq += 1;
            written += n;
            self.counters.objects_written.fetch_add(1, Ordering::Relaxed);
            let flushed = match stream {
                Stream::Entries => &self.counters.entries_flushed,
                Stream::Stdout => &self.counters.lines_flushed,
            };
            flushed.fetch_add(n as u64, Ordering::Relaxed);
            debug!(key = %key, records = n, bytes = data.len(), "Flushed batch");
        }
        buf.oldest_at = None;
        Ok(written)
    }
}

impl<S: ObjectStore, C: LogClock> Drop for LogWriter<S, C> {
    fn drop(&mut self) {
        let open = matches!(*self.state.get_mut(), RunState::Open(_));
        let pending = self.stats().pending();
        if open && pending > 0 {
            warn!(
                uid = self.uid,
                pending, "Writer dropped with unflushed records; call cleanup() first"
            );
        }
    }
}

/// Check reserved keys; returns the payload's own `step` if it has one
fn validate_payload(payload: &Payload) -> LogStoreResult<Option<u64>> {
    let step = match payload.get(RESERVED_STEP) {
        None => None,
        Some(value) => Some(value.as_u64().ok_or_else(|| {
            LogStoreError::InvalidPayload(format!(
                "`{}` must be a non-negative integer, got {}",
                RESERVED_STEP, value
            ))
        })?),
    };
    if let Some(value) = payload.get(RESERVED_TIMESTAMP) {
        if !value.is_string() {
            return Err(LogStoreError::InvalidPayload(format!(
                "`{}` must be a string, got {}",
                RESERVED_TIMESTAMP, value
            )));
        }
    }
    Ok(step)
}
