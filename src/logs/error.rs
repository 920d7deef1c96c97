//! Error taxonomy for the log engine.
//!
//! The object-store layer speaks `std::io::Result`; everything above the
//! retry boundary speaks `LogStoreError`.

use std::fmt;
use std::io;

/// Store primitive that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Put,
    Get,
    List,
    Exists,
    Health,
}

impl fmt::Display for StoreOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreOp::Put => "PUT",
            StoreOp::Get => "GET",
            StoreOp::List => "LIST",
            StoreOp::Exists => "EXISTS",
            StoreOp::Health => "HEALTH",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    /// Expected absence of an object or run
    #[error("not found: {key}")]
    NotFound { key: String },

    /// Retryable failure (network, 5xx, timeout); surfaced only when a caller
    /// inspects a single attempt
    #[error("transient {op} failure for {key}: {source}")]
    StorageTransient {
        op: StoreOp,
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("write of {key} failed after {attempts} attempt(s): {source}")]
    StorageWrite {
        key: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("{op} of {key} failed after {attempts} attempt(s): {source}")]
    StorageRead {
        op: StoreOp,
        key: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("run {run_id} is closed")]
    RunClosed { run_id: String },

    #[error("run {run_id} is already initialized")]
    AlreadyInitialized { run_id: String },

    #[error("validator {uid} has no open run")]
    RunNotInitialized { uid: u64 },

    #[error("no runs found for validator {uid}")]
    NoRunsFound { uid: u64 },

    /// Corrupt or truncated stored object
    #[error("cannot decode {key}: {reason}")]
    Decode { key: String, reason: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid run id {run_id:?}: {reason}")]
    InvalidRunId { run_id: String, reason: String },

    #[error("sequence numbers exhausted for {stream}")]
    SequenceExhausted { stream: String },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type LogStoreResult<T> = Result<T, LogStoreError>;

impl LogStoreError {
    /// Whether another attempt of the same operation may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LogStoreError::StorageTransient { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LogStoreError::NotFound { .. })
    }

    /// Object key the failure concerns, when there is one
    pub fn key(&self) -> Option<&str> {
        match self {
            LogStoreError::NotFound { key }
            | LogStoreError::StorageTransient { key, .. }
            | LogStoreError::StorageWrite { key, .. }
            | LogStoreError::StorageRead { key, .. }
            | LogStoreError::Decode { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Map one failed store attempt into the taxonomy.
    ///
    /// `NotFound` stays `NotFound`. Kinds that no retry can fix become the
    /// exhausted variant immediately; everything else is transient.
    pub fn classify(op: StoreOp, key: &str, err: io::Error, attempts: u32) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => LogStoreError::NotFound {
                key: key.to_string(),
            },
            io::ErrorKind::PermissionDenied
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::InvalidData
            | io::ErrorKind::Unsupported
            | io::ErrorKind::AlreadyExists => Self::exhausted(op, key, err, attempts),
            _ => LogStoreError::StorageTransient {
                op,
                key: key.to_string(),
                source: err,
            },
        }
    }

    /// Terminal failure after `attempts` tries
    pub fn exhausted(op: StoreOp, key: &str, source: io::Error, attempts: u32) -> Self {
        match op {
            StoreOp::Put => LogStoreError::StorageWrite {
                key: key.to_string(),
                attempts,
                source,
            },
            _ => LogStoreError::StorageRead {
                op,
                key: key.to_string(),
                attempts,
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_found() {
        let err = LogStoreError::classify(
            StoreOp::Get,
            "validator_1/r/config.json",
            io::Error::new(io::ErrorKind::NotFound, "missing"),
            1,
        );
        assert!(err.is_not_found());
        assert_eq!(err.key(), Some("validator_1/r/config.json"));
    }

    #[test]
    fn test_classify_transient() {
        for kind in [
            io::ErrorKind::TimedOut,
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::Other,
        ] {
            let err = LogStoreError::classify(StoreOp::List, "p/", io::Error::new(kind, "x"), 1);
            assert!(err.is_transient(), "{:?} should be transient", kind);
        }
    }

    #[test]
    fn test_classify_permanent() {
        let err = LogStoreError::classify(
            StoreOp::Put,
            "k",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
            1,
        );
        assert!(matches!(err, LogStoreError::StorageWrite { attempts: 1, .. }));

        let err = LogStoreError::classify(
            StoreOp::Get,
            "k",
            io::Error::new(io::ErrorKind::InvalidInput, "bad"),
            1,
        );
        assert!(matches!(
            err,
            LogStoreError::StorageRead {
                op: StoreOp::Get,
                ..
            }
        ));
    }

    #[test]
    fn test_display_carries_context() {
        let err = LogStoreError::exhausted(
            StoreOp::List,
            "validator_7/",
            io::Error::new(io::ErrorKind::TimedOut, "slow"),
            3,
        );
        let text = err.to_string();
        assert!(text.contains("LIST"));
        assert!(text.contains("validator_7/"));
        assert!(text.contains("3 attempt"));
    }
}
