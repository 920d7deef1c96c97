//! Deterministic Simulation Testing for the log engine
//!
//! Drives a `LogWriter` over a fault-injecting store with a seeded workload,
//! keeps a shadow copy of everything logged, then checks what a reader can
//! rebuild from the bucket against it.
//!
//! ```text
//! for seed in 0..N {
//!     let mut harness = LogStoreDSTHarness::new(LogStoreDSTConfig::chaos(seed));
//!     harness.run(500).await;
//!     harness.check_invariants().await;   // violations carry the seed
//! }
//! ```
//!
//! Invariants, per run:
//! - no record is stored twice
//! - stored records are a subsequence of the logged records, in log order
//! - every record covered by an acknowledged flush is stored (unless the
//!   store is configured to destroy data)
//! - a successfully finished run stores exactly what was logged
//! - a run reported finished has its `_finished` marker

use crate::io::simulation::SimulatedRng;
use crate::io::Rng;
use crate::logs::error::LogStoreError;
use crate::logs::keys::{self, RunId};
use crate::logs::model::{LogLevel, Payload};
use crate::logs::reader::LogReader;
use crate::logs::writer::LogWriter;
use crate::storage::clock::{LogClock, SimulatedClock};
use crate::storage::config::{LogStoreConfig, RetryConfig, WriterConfig};
use crate::storage::object_store::{InMemoryObjectStore, ObjectStore};
use crate::storage::simulated_store::{
    SimulatedObjectStore, SimulatedStoreConfig, SimulatedStoreStats,
};
use serde_json::Value;
use std::collections::HashSet;

const LEVELS: [&str; 4] = ["INFO", "DEBUG", "WARNING", "ERROR"];
const RECORD_FIELD: &str = "record";

/// Configuration for one simulated run
#[derive(Debug, Clone)]
pub struct LogStoreDSTConfig {
    pub seed: u64,
    pub uid: u64,
    pub store_config: SimulatedStoreConfig,
    pub writer: WriterConfig,
    pub retry: RetryConfig,
    /// Share of appends that go to stdout instead of entries
    pub stdout_probability: f64,
    pub flush_probability: f64,
    /// Finish the current run and start a new one
    pub finish_probability: f64,
    /// Drop the writer without finish or cleanup
    pub crash_probability: f64,
    /// Upper bound of simulated time passing between operations
    pub max_clock_step_ms: u64,
}

impl Default for LogStoreDSTConfig {
    fn default() -> Self {
        LogStoreDSTConfig {
            seed: 0,
            uid: 1,
            store_config: SimulatedStoreConfig::default(),
            writer: WriterConfig::test(),
            retry: RetryConfig::test(),
            stdout_probability: 0.4,
            flush_probability: 0.05,
            finish_probability: 0.02,
            crash_probability: 0.0,
            max_clock_step_ms: 20,
        }
    }
}

impl LogStoreDSTConfig {
    pub fn new(seed: u64) -> Self {
        LogStoreDSTConfig {
            seed,
            ..Default::default()
        }
    }

    /// No faults
    pub fn calm(seed: u64) -> Self {
        LogStoreDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::no_faults(),
            ..Default::default()
        }
    }

    pub fn moderate(seed: u64) -> Self {
        LogStoreDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::default(),
            crash_probability: 0.01,
            ..Default::default()
        }
    }

    /// Aggressive transient faults and crashes
    pub fn chaos(seed: u64) -> Self {
        LogStoreDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::high_chaos(),
            crash_probability: 0.02,
            finish_probability: 0.03,
            ..Default::default()
        }
    }

    /// Truncated writes and corrupted reads on top of the moderate rates
    pub fn corrupting(seed: u64) -> Self {
        LogStoreDSTConfig {
            seed,
            store_config: SimulatedStoreConfig::with_corruption(),
            crash_probability: 0.01,
            ..Default::default()
        }
    }

    fn log_store_config(&self) -> LogStoreConfig {
        let mut config = LogStoreConfig::test();
        config.writer = self.writer.clone();
        config.retry = self.retry.clone();
        config
    }
}

/// Workload operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOperation {
    Entry { record: u64, level: &'static str },
    Line { record: u64, level: &'static str },
    Flush,
    Finish,
    Crash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Success,
    /// Failed under fault injection; not an invariant violation by itself
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct RecordedOperation {
    pub id: u64,
    pub operation: LogOperation,
    pub outcome: OperationOutcome,
    pub at_ms: u64,
}

/// What the harness knows about one run
#[derive(Debug, Clone)]
struct ShadowRun {
    run_id: RunId,
    /// Record ids accepted by the writer, in log order
    entries: Vec<u64>,
    lines: Vec<u64>,
    /// Length of the prefix covered by acknowledged PUTs
    durable_entries: usize,
    durable_lines: usize,
    finished: bool,
    crashed: bool,
}

impl ShadowRun {
    fn new(run_id: RunId) -> Self {
        ShadowRun {
            run_id,
            entries: Vec::new(),
            lines: Vec::new(),
            durable_entries: 0,
            durable_lines: 0,
            finished: false,
            crashed: false,
        }
    }
}

/// Result of a DST run
#[derive(Debug, Clone)]
pub struct LogStoreDSTResult {
    pub seed: u64,
    pub total_operations: u64,
    pub successful_operations: u64,
    pub failed_operations: u64,
    pub runs_started: u64,
    pub runs_finished: u64,
    pub crashes: u64,
    /// Reads through the faulty store that gave up
    pub read_failures: u64,
    pub store_stats: SimulatedStoreStats,
    pub invariant_violations: Vec<String>,
    pub history: Vec<RecordedOperation>,
}

impl LogStoreDSTResult {
    pub fn new(seed: u64) -> Self {
        LogStoreDSTResult {
            seed,
            total_operations: 0,
            successful_operations: 0,
            failed_operations: 0,
            runs_started: 0,
            runs_finished: 0,
            crashes: 0,
            read_failures: 0,
            store_stats: SimulatedStoreStats::default(),
            invariant_violations: Vec::new(),
            history: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.invariant_violations.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Seed {}: {} ops ({} ok, {} failed), {} runs ({} finished, {} crashed), {} store faults, {} violations",
            self.seed,
            self.total_operations,
            self.successful_operations,
            self.failed_operations,
            self.runs_started,
            self.runs_finished,
            self.crashes,
            self.store_stats.total_faults(),
            self.invariant_violations.len()
        )
    }
}

type DSTStore = SimulatedObjectStore<InMemoryObjectStore, SimulatedRng>;

pub struct LogStoreDSTHarness {
    config: LogStoreDSTConfig,
    rng: SimulatedRng,
    clock: SimulatedClock,
    store: DSTStore,
    inner_store: InMemoryObjectStore,
    writer: Option<LogWriter<DSTStore, SimulatedClock>>,
    runs: Vec<ShadowRun>,
    next_record: u64,
    result: LogStoreDSTResult,
}

impl LogStoreDSTHarness {
    pub fn new(config: LogStoreDSTConfig) -> Self {
        let inner_store = InMemoryObjectStore::with_page_size(16);
        // Separate streams for the workload and the store's faults
        let store = SimulatedObjectStore::new(
            inner_store.clone(),
            SimulatedRng::new(config.seed.wrapping_add(1)),
            config.store_config.clone(),
        );
        LogStoreDSTHarness {
            rng: SimulatedRng::new(config.seed),
            clock: SimulatedClock::new(1_700_000_000_000),
            store,
            inner_store,
            writer: None,
            runs: Vec::new(),
            next_record: 0,
            result: LogStoreDSTResult::new(config.seed),
            config,
        }
    }

    pub fn next_operation(&mut self) -> LogOperation {
        let c = &self.config;
        let roll = self.rng.next_u64() as f64 / u64::MAX as f64;
        let crash_at = c.crash_probability;
        let finish_at = crash_at + c.finish_probability;
        let flush_at = finish_at + c.flush_probability;

        if roll < crash_at {
            LogOperation::Crash
        } else if roll < finish_at {
            LogOperation::Finish
        } else if roll < flush_at {
            LogOperation::Flush
        } else {
            let record = self.next_record;
            self.next_record += 1;
            let level = LEVELS[self.rng.gen_range(0, LEVELS.len() as u64) as usize];
            if self.rng.gen_bool(self.config.stdout_probability) {
                LogOperation::Line { record, level }
            } else {
                LogOperation::Entry { record, level }
            }
        }
    }

    pub async fn run(&mut self, operations: usize) {
        for _ in 0..operations {
            let op = self.next_operation();
            self.execute(op).await;
        }
    }

    async fn execute(&mut self, op: LogOperation) {
        let step = self.rng.gen_range(0, self.config.max_clock_step_ms + 1);
        self.clock.advance_ms(step);
        self.result.total_operations += 1;

        let outcome = match &op {
            LogOperation::Entry { record, level } => self.execute_entry(*record, level).await,
            LogOperation::Line { record, level } => self.execute_line(*record, level).await,
            LogOperation::Flush => self.execute_flush().await,
            LogOperation::Finish => self.execute_finish().await,
            LogOperation::Crash => self.execute_crash(),
        };
        self.sync_durable();

        match &outcome {
            OperationOutcome::Success => self.result.successful_operations += 1,
            OperationOutcome::Failed(_) => self.result.failed_operations += 1,
        }
        self.result.history.push(RecordedOperation {
            id: self.result.total_operations,
            operation: op,
            outcome,
            at_ms: self.clock.now().as_millis(),
        });
    }

    /// Open a run if none is active. A failed init is retried under a new id
    /// on the next operation.
    async fn ensure_run(&mut self) -> Result<(), String> {
        if self.writer.is_some() {
            return Ok(());
        }
        let writer = LogWriter::with_clock(
            self.config.uid,
            self.store.clone(),
            self.clock.clone(),
            &self.config.log_store_config(),
        );
        let run_id = RunId::generate(self.clock.now(), self.rng.next_u64() as u32);
        let mut run_config = Payload::new();
        run_config.insert("seed".to_string(), Value::from(self.config.seed));

        match writer.init_run_with_id(run_id.clone(), run_config, "dst").await {
            Ok(_) => {
                self.result.runs_started += 1;
                self.runs.push(ShadowRun::new(run_id));
                self.writer = Some(writer);
                Ok(())
            }
            Err(e) => Err(format!("init: {}", e)),
        }
    }

    async fn execute_entry(&mut self, record: u64, level: &str) -> OperationOutcome {
        if let Err(e) = self.ensure_run().await {
            return OperationOutcome::Failed(e);
        }
        let Some(writer) = self.writer.as_ref() else {
            return OperationOutcome::Failed("no writer".to_string());
        };
        let mut payload = Payload::new();
        payload.insert(RECORD_FIELD.to_string(), Value::from(record));
        payload.insert("level".to_string(), Value::from(level));

        let result = writer.log(payload, None).await;
        if accepted(&result) {
            if let Some(run) = self.runs.last_mut() {
                run.entries.push(record);
            }
        }
        outcome(result)
    }

    async fn execute_line(&mut self, record: u64, level: &str) -> OperationOutcome {
        if let Err(e) = self.ensure_run().await {
            return OperationOutcome::Failed(e);
        }
        let Some(writer) = self.writer.as_ref() else {
            return OperationOutcome::Failed("no writer".to_string());
        };
        let result = writer
            .log_stdout(format!("record-{}", record), LogLevel::parse(level))
            .await;
        if accepted(&result) {
            if let Some(run) = self.runs.last_mut() {
                run.lines.push(record);
            }
        }
        outcome(result)
    }

    async fn execute_flush(&mut self) -> OperationOutcome {
        match self.writer.as_ref() {
            Some(writer) => outcome(writer.flush().await),
            None => OperationOutcome::Success,
        }
    }

    async fn execute_finish(&mut self) -> OperationOutcome {
        let Some(writer) = self.writer.take() else {
            return OperationOutcome::Success;
        };
        match writer.finish().await {
            Ok(()) => {
                let stats = writer.stats();
                writer.cleanup().await;
                if let Some(run) = self.runs.last_mut() {
                    run.durable_entries = stats.entries_flushed as usize;
                    run.durable_lines = stats.lines_flushed as usize;
                    run.finished = true;
                }
                self.result.runs_finished += 1;
                OperationOutcome::Success
            }
            Err(e) => {
                self.writer = Some(writer);
                OperationOutcome::Failed(format!("finish: {}", e))
            }
        }
    }

    fn execute_crash(&mut self) -> OperationOutcome {
        if self.writer.take().is_some() {
            if let Some(run) = self.runs.last_mut() {
                run.crashed = true;
            }
            self.result.crashes += 1;
        }
        OperationOutcome::Success
    }

    /// Acknowledged flush counts are the durable prefix of each stream
    fn sync_durable(&mut self) {
        let (Some(writer), Some(run)) = (self.writer.as_ref(), self.runs.last_mut()) else {
            return;
        };
        let stats = writer.stats();
        run.durable_entries = stats.entries_flushed as usize;
        run.durable_lines = stats.lines_flushed as usize;
    }

    /// Close out the active run, then compare the bucket to the shadow state
    pub async fn check_invariants(&mut self) {
        if self.writer.is_some() {
            for _ in 0..5 {
                if self.execute_finish().await == OperationOutcome::Success {
                    break;
                }
            }
        }
        if let Some(writer) = self.writer.take() {
            writer.cleanup().await;
        }

        let destroys_data = self.config.store_config.destroys_data();
        let clean = LogReader::new(self.inner_store.clone(), &LogStoreConfig::test());

        match clean.get_runs(self.config.uid).await {
            Ok(listed) => {
                if listed.windows(2).any(|w| w[0] <= w[1]) {
                    self.violation(format!("get_runs not strictly descending: {:?}", listed));
                }
                let missing: Vec<String> = self
                    .runs
                    .iter()
                    .filter(|run| !listed.contains(&run.run_id))
                    .map(|run| format!("run {} missing from get_runs", run.run_id))
                    .collect();
                for msg in missing {
                    self.violation(msg);
                }
            }
            Err(e) => self.violation(format!("get_runs on fault-free store: {}", e)),
        }

        let runs = self.runs.clone();
        for run in &runs {
            self.check_run(&clean, run, destroys_data).await;
        }
        self.check_faulty_reads(&runs).await;
        self.result.store_stats = self.store.stats();
    }

    async fn check_run(
        &mut self,
        reader: &LogReader<InMemoryObjectStore>,
        run: &ShadowRun,
        destroys_data: bool,
    ) {
        let uid = self.config.uid;
        let entries = match reader.fetch_entries(uid, Some(&run.run_id), None, usize::MAX).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.violation(format!("run {}: fetch_entries failed: {}", run.run_id, e));
                return;
            }
        };
        let lines = match reader.fetch_stdout(uid, Some(&run.run_id), None, usize::MAX).await {
            Ok(fetched) => fetched,
            Err(e) => {
                self.violation(format!("run {}: fetch_stdout failed: {}", run.run_id, e));
                return;
            }
        };

        if !destroys_data && !(entries.skipped_objects.is_empty() && lines.skipped_objects.is_empty())
        {
            self.violation(format!(
                "run {}: corrupt objects without data-destroying faults: {:?} {:?}",
                run.run_id, entries.skipped_objects, lines.skipped_objects
            ));
        }

        let stored_entries: Vec<u64> = entries
            .records
            .iter()
            .filter_map(|e| e.payload.get(RECORD_FIELD).and_then(Value::as_u64))
            .collect();
        let stored_lines: Vec<u64> = lines
            .records
            .iter()
            .filter_map(|l| l.message.strip_prefix("record-")?.parse().ok())
            .collect();

        for (stream, stored, logged, durable) in [
            ("entries", &stored_entries, &run.entries, run.durable_entries),
            ("stdout", &stored_lines, &run.lines, run.durable_lines),
        ] {
            if let Some(msg) = check_stream(stored, logged, durable, run.finished, destroys_data) {
                self.violation(format!("run {} {}: {}", run.run_id, stream, msg));
            }
        }

        let marker = keys::finished_key(uid, &run.run_id);
        let has_marker = self.inner_store.exists(&marker).await.unwrap_or(false);
        if run.finished && !has_marker {
            self.violation(format!("run {} finished without marker", run.run_id));
        }
    }

    /// Reads through the faulty store may fail or see less, never more or reordered
    async fn check_faulty_reads(&mut self, runs: &[ShadowRun]) {
        let reader = LogReader::new(self.store.clone(), &self.config.log_store_config());
        for run in runs {
            match reader
                .fetch_logs(self.config.uid, Some(&run.run_id), None, usize::MAX)
                .await
            {
                Ok(fetched) => {
                    let ids: Vec<u64> = fetched
                        .records
                        .iter()
                        .filter_map(|r| r.as_entry())
                        .filter_map(|e| e.payload.get(RECORD_FIELD).and_then(Value::as_u64))
                        .collect();
                    if let Some(msg) = check_stream(&ids, &run.entries, 0, false, true) {
                        self.violation(format!("run {} faulty read: {}", run.run_id, msg));
                    }
                }
                Err(e) if is_storage_failure(&e) => self.result.read_failures += 1,
                Err(e) => {
                    self.violation(format!("run {} faulty read: unexpected {}", run.run_id, e))
                }
            }
        }
    }

    fn violation(&mut self, msg: String) {
        self.result
            .invariant_violations
            .push(format!("seed {}: {}", self.config.seed, msg));
    }

    pub fn result(&self) -> &LogStoreDSTResult {
        &self.result
    }

    pub fn into_result(self) -> LogStoreDSTResult {
        self.result
    }
}

/// A record is buffered unless it was rejected before reaching the buffer
fn accepted<T>(result: &Result<T, LogStoreError>) -> bool {
    !matches!(
        result,
        Err(LogStoreError::InvalidPayload(_)
            | LogStoreError::RunClosed { .. }
            | LogStoreError::RunNotInitialized { .. })
    )
}

fn outcome<T>(result: Result<T, LogStoreError>) -> OperationOutcome {
    match result {
        Ok(_) => OperationOutcome::Success,
        Err(e) => OperationOutcome::Failed(e.to_string()),
    }
}

fn is_storage_failure(err: &LogStoreError) -> bool {
    matches!(
        err,
        LogStoreError::StorageRead { .. } | LogStoreError::StorageTransient { .. }
    )
}

/// Compare one stored stream against its shadow; `None` when consistent
fn check_stream(
    stored: &[u64],
    logged: &[u64],
    durable: usize,
    finished: bool,
    destroys_data: bool,
) -> Option<String> {
    let mut seen = HashSet::with_capacity(stored.len());
    if let Some(dup) = stored.iter().find(|id| !seen.insert(**id)) {
        return Some(format!("record {} stored twice", dup));
    }

    let mut logged_iter = logged.iter();
    if let Some(stray) = stored
        .iter()
        .find(|id| !logged_iter.by_ref().any(|l| l == *id))
    {
        return Some(format!("record {} out of order or never logged", stray));
    }

    if destroys_data {
        return None;
    }
    let durable = durable.min(logged.len());
    if stored.len() < durable || stored[..durable] != logged[..durable] {
        return Some(format!(
            "acknowledged prefix of {} records not stored (stored {})",
            durable,
            stored.len()
        ));
    }
    if finished && stored != logged {
        return Some(format!(
            "finished run stored {} of {} records",
            stored.len(),
            logged.len()
        ));
    }
    None
}

/// Run `count` seeds starting at `base_seed`
pub async fn run_dst_batch(
    base_seed: u64,
    count: usize,
    ops_per_run: usize,
    config_fn: impl Fn(u64) -> LogStoreDSTConfig,
) -> Vec<LogStoreDSTResult> {
    let mut results = Vec::with_capacity(count);
    for i in 0..count {
        let mut harness = LogStoreDSTHarness::new(config_fn(base_seed + i as u64));
        harness.run(ops_per_run).await;
        harness.check_invariants().await;
        results.push(harness.into_result());
    }
    results
}

pub fn summarize_batch(results: &[LogStoreDSTResult]) -> String {
    let passed = results.iter().filter(|r| r.is_success()).count();
    let failed_seeds: Vec<u64> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.seed)
        .collect();
    let total_ops: u64 = results.iter().map(|r| r.total_operations).sum();
    let total_faults: u64 = results.iter().map(|r| r.store_stats.total_faults()).sum();
    let total_crashes: u64 = results.iter().map(|r| r.crashes).sum();

    let mut summary = format!(
        "Batch: {}/{} passed, {} total ops, {} store faults, {} crashes",
        passed,
        results.len(),
        total_ops,
        total_faults,
        total_crashes
    );
    if !failed_seeds.is_empty() {
        summary.push_str(&format!("\nFailed seeds: {:?}", failed_seeds));
    }
    summary
}
