//! Validator run logs on object storage
//!
//! ## Layout
//!
//! ```text
//! validator_<uid>/<run_id>/config.json
//! validator_<uid>/<run_id>/entries/<seq:010>.json   JSON array of entries
//! validator_<uid>/<run_id>/stdout/<seq:010>.log     JSON lines
//! validator_<uid>/<run_id>/_finished                written once, last
//! ```
//!
//! Objects are immutable once acknowledged. Sequence numbers are zero-padded
//! so LIST's lexicographic order is write order.
//!
//! ## Components
//!
//! - `LogWriter`: batches appends per stream and PUTs them with retry
//! - `FlushWorker`: periodic flush of a shared writer
//! - `LogReader`: discovers validators and runs and rebuilds filtered logs
//! - `dst`: seeded fault-injection harness for the two together

pub mod codec;
pub mod dst;
pub mod error;
pub mod flush_worker;
pub mod keys;
pub mod model;
pub mod reader;
pub mod writer;

pub use dst::{
    run_dst_batch, summarize_batch, LogStoreDSTConfig, LogStoreDSTHarness, LogStoreDSTResult,
};
pub use error::{LogStoreError, LogStoreResult, StoreOp};
pub use flush_worker::{FlushWorker, FlushWorkerHandle};
pub use keys::{ParsedKey, RunId, RunObject};
pub use model::{FinishedMarker, LogEntry, LogLevel, LogLine, LogRecord, Payload};
pub use reader::{FetchedLogs, LogReader, RunStatus, StoreMetrics, DEFAULT_FETCH_CONCURRENCY};
pub use writer::{LogWriter, WriterStats};
