pub mod buggify;
pub mod io;
pub mod logs;
pub mod observability;
pub mod storage;

pub use logs::{
    FetchedLogs, FlushWorker, LogEntry, LogLevel, LogLine, LogReader, LogRecord, LogStoreError,
    LogStoreResult, LogWriter, Payload, RunId, RunStatus, StoreMetrics,
};
pub use storage::{
    InMemoryObjectStore, LocalFsObjectStore, LogStoreConfig, ObjectStore, ObjectStoreType,
};
