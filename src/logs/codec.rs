//! Batch object encoding.
//!
//! Entries objects are one JSON array; stdout objects are JSON lines. A batch
//! decodes whole or not at all, so a truncated object never yields a partial
//! prefix of its records.

use crate::logs::error::{LogStoreError, LogStoreResult};
use crate::logs::model::{FinishedMarker, LogEntry, LogLine, Payload};

pub fn encode_entries(entries: &[LogEntry]) -> LogStoreResult<Vec<u8>> {
    serde_json::to_vec(entries).map_err(|e| LogStoreError::InvalidPayload(e.to_string()))
}

pub fn decode_entries(key: &str, data: &[u8]) -> LogStoreResult<Vec<LogEntry>> {
    serde_json::from_slice(data).map_err(|e| decode_error(key, e))
}

pub fn encode_lines(lines: &[LogLine]) -> LogStoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(lines.len() * 96);
    for line in lines {
        serde_json::to_writer(&mut out, line)
            .map_err(|e| LogStoreError::InvalidPayload(e.to_string()))?;
        out.push(b'\n');
    }
    Ok(out)
}

pub fn decode_lines(key: &str, data: &[u8]) -> LogStoreResult<Vec<LogLine>> {
    // Every record, the last included, ends with '\n'; anything else was cut short
    if !data.is_empty() && data.last() != Some(&b'\n') {
        return Err(LogStoreError::Decode {
            key: key.to_string(),
            reason: "missing trailing newline".to_string(),
        });
    }
    data.split(|b| *b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).map_err(|e| decode_error(key, e)))
        .collect()
}

pub fn encode_config(config: &Payload) -> LogStoreResult<Vec<u8>> {
    serde_json::to_vec_pretty(config).map_err(|e| LogStoreError::InvalidPayload(e.to_string()))
}

pub fn decode_config(key: &str, data: &[u8]) -> LogStoreResult<Payload> {
    serde_json::from_slice(data).map_err(|e| decode_error(key, e))
}

pub fn encode_finished(marker: &FinishedMarker) -> LogStoreResult<Vec<u8>> {
    serde_json::to_vec(marker).map_err(|e| LogStoreError::InvalidPayload(e.to_string()))
}

pub fn decode_finished(key: &str, data: &[u8]) -> LogStoreResult<FinishedMarker> {
    serde_json::from_slice(data).map_err(|e| decode_error(key, e))
}

fn decode_error(key: &str, err: serde_json::Error) -> LogStoreError {
    LogStoreError::Decode {
        key: key.to_string(),
        reason: err.to_string(),
    }
}
