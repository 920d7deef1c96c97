//! Object key scheme
//!
//! ```text
//! validator_<uid>/<run_id>/config.json
//! validator_<uid>/<run_id>/entries/<seq10>.json
//! validator_<uid>/<run_id>/stdout/<seq10>.log
//! validator_<uid>/<run_id>/_finished
//! ```
//!
//! Sequence numbers are zero padded to a fixed width and run ids start with a
//! fixed-width UTC timestamp, so ascending LIST order is write order and the
//! greatest run id is the most recent run.

use crate::logs::error::{LogStoreError, LogStoreResult};
use crate::storage::clock::LogTimestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const VALIDATOR_PREFIX: &str = "validator_";
pub const CONFIG_FILE: &str = "config.json";
pub const FINISHED_FILE: &str = "_finished";
pub const ENTRIES_DIR: &str = "entries";
pub const STDOUT_DIR: &str = "stdout";

/// Digits in a sequence number segment
pub const SEQ_WIDTH: usize = 10;
/// Largest sequence number representable in `SEQ_WIDTH` digits
pub const SEQ_MAX: u64 = 9_999_999_999;

/// Identifier of one run, unique under its validator
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Accept a non-empty segment of ASCII letters, digits, `.`, `_` and `-`
    pub fn new(id: impl Into<String>) -> LogStoreResult<Self> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(RunId(id))
    }

    /// `<YYYYMMDDTHHMMSSmmmZ>-<8 hex>`; sorts by creation time across writers
    /// whose clocks agree
    pub fn generate(now: LogTimestamp, entropy: u32) -> Self {
        RunId(format!("{}-{:08x}", now.to_compact(), entropy))
    }

    /// Ids must survive object-store path encoding unchanged, or listed keys
    /// would not map back to the run that wrote them.
    pub fn validate(id: &str) -> LogStoreResult<()> {
        let reason = if id.is_empty() {
            "must not be empty"
        } else if id == "." || id == ".." {
            "must not be a relative path component"
        } else if !id.bytes().all(is_run_id_byte) {
            "may only contain ASCII letters, digits, '.', '_' and '-'"
        } else {
            return Ok(());
        };
        Err(LogStoreError::InvalidRunId {
            run_id: id.to_string(),
            reason: reason.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_run_id_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-')
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = LogStoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RunId::new(value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RunId {
    type Err = LogStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RunId::new(s)
    }
}

/// Which object of a run a key names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunObject {
    Config,
    Entries(u64),
    Stdout(u64),
    Finished,
}

/// Decomposed object key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub uid: u64,
    pub run_id: RunId,
    pub object: RunObject,
}

pub fn validator_prefix(uid: u64) -> String {
    format!("{}{}/", VALIDATOR_PREFIX, uid)
}

pub fn run_prefix(uid: u64, run_id: &RunId) -> String {
    format!("{}{}/{}/", VALIDATOR_PREFIX, uid, run_id)
}

pub fn config_key(uid: u64, run_id: &RunId) -> String {
    format!("{}{}", run_prefix(uid, run_id), CONFIG_FILE)
}

pub fn finished_key(uid: u64, run_id: &RunId) -> String {
    format!("{}{}", run_prefix(uid, run_id), FINISHED_FILE)
}

pub fn entries_prefix(uid: u64, run_id: &RunId) -> String {
    format!("{}{}/", run_prefix(uid, run_id), ENTRIES_DIR)
}

pub fn stdout_prefix(uid: u64, run_id: &RunId) -> String {
    format!("{}{}/", run_prefix(uid, run_id), STDOUT_DIR)
}

pub fn entries_key(uid: u64, run_id: &RunId, seq: u64) -> String {
    debug_assert!(seq <= SEQ_MAX, "sequence {} overflows {} digits", seq, SEQ_WIDTH);
    format!("{}{:0width$}.json", entries_prefix(uid, run_id), seq, width = SEQ_WIDTH)
}

pub fn stdout_key(uid: u64, run_id: &RunId, seq: u64) -> String {
    debug_assert!(seq <= SEQ_MAX, "sequence {} overflows {} digits", seq, SEQ_WIDTH);
    format!("{}{:0width$}.log", stdout_prefix(uid, run_id), seq, width = SEQ_WIDTH)
}

/// `validator_<uid>` segment to uid; rejects signs, leading zeros and overflow
pub fn parse_validator_segment(segment: &str) -> Option<u64> {
    let digits = segment.strip_prefix(VALIDATOR_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse().ok()
}

fn parse_seq(segment: &str, extension: &str) -> Option<u64> {
    let digits = segment.strip_suffix(extension)?;
    if digits.len() != SEQ_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Run id segment of a key under `validator_<uid>/`, if the key has one
pub fn run_segment(key: &str) -> Option<&str> {
    let mut parts = key.splitn(3, '/');
    parse_validator_segment(parts.next()?)?;
    let run = parts.next()?;
    // A run segment is only real if something is stored below it
    parts.next()?;
    RunId::validate(run).ok()?;
    Some(run)
}

/// Inverse of the key builders; `None` for keys outside the scheme
pub fn parse_key(key: &str) -> Option<ParsedKey> {
    let parts: Vec<&str> = key.split('/').collect();
    let (uid, run, rest) = match parts.as_slice() {
        [v, run, rest @ ..] if !rest.is_empty() => (parse_validator_segment(v)?, *run, rest),
        _ => return None,
    };
    let run_id = RunId::new(run).ok()?;

    let object = match rest {
        [CONFIG_FILE] => RunObject::Config,
        [FINISHED_FILE] => RunObject::Finished,
        [ENTRIES_DIR, file] => RunObject::Entries(parse_seq(file, ".json")?),
        [STDOUT_DIR, file] => RunObject::Stdout(parse_seq(file, ".log")?),
        _ => return None,
    };

    Some(ParsedKey {
        uid,
        run_id,
        object,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunId {
        RunId::new("20240102T030405006Z-0000abcd").unwrap()
    }

    #[test]
    fn test_key_layout() {
        let r = run();
        assert_eq!(validator_prefix(7), "validator_7/");
        assert_eq!(config_key(7, &r), "validator_7/20240102T030405006Z-0000abcd/config.json");
        assert_eq!(finished_key(7, &r), "validator_7/20240102T030405006Z-0000abcd/_finished");
        assert_eq!(
            entries_key(7, &r, 42),
            "validator_7/20240102T030405006Z-0000abcd/entries/0000000042.json"
        );
        assert_eq!(
            stdout_key(0, &r, 0),
            "validator_0/20240102T030405006Z-0000abcd/stdout/0000000000.log"
        );
        assert_eq!(
            entries_key(1, &r, SEQ_MAX),
            "validator_1/20240102T030405006Z-0000abcd/entries/9999999999.json"
        );
    }

    #[test]
    fn test_parse_key_inverts_builders() {
        let r = run();
        let cases = [
            (config_key(3, &r), RunObject::Config),
            (finished_key(3, &r), RunObject::Finished),
            (entries_key(3, &r, 17), RunObject::Entries(17)),
            (stdout_key(3, &r, SEQ_MAX), RunObject::Stdout(SEQ_MAX)),
        ];
        for (key, object) in cases {
            let parsed = parse_key(&key).unwrap();
            assert_eq!(parsed.uid, 3);
            assert_eq!(parsed.run_id, r);
            assert_eq!(parsed.object, object, "key {}", key);
        }
    }

    #[test]
    fn test_parse_key_rejects_foreign_keys() {
        for key in [
            "",
            "validator_1",
            "validator_1/run",
            "validator_01/run/config.json",
            "validator_-1/run/config.json",
            "validator_x/run/config.json",
            "other/run/config.json",
            "validator_1/run/entries/42.json",
            "validator_1/run/entries/0000000042.log",
            "validator_1/run/stdout/00000000042.log",
            "validator_1/run/notes.txt",
            "validator_1/run/entries/sub/0000000001.json",
        ] {
            assert!(parse_key(key).is_none(), "{:?} should not parse", key);
        }
    }

    #[test]
    fn test_validator_segment() {
        assert_eq!(parse_validator_segment("validator_0"), Some(0));
        assert_eq!(parse_validator_segment("validator_18446744073709551615"), Some(u64::MAX));
        assert_eq!(parse_validator_segment("validator_18446744073709551616"), None);
        assert_eq!(parse_validator_segment("validator_007"), None);
        assert_eq!(parse_validator_segment("validator_"), None);
        assert_eq!(parse_validator_segment("validator_+1"), None);
        assert_eq!(parse_validator_segment("Validator_1"), None);
    }

    #[test]
    fn test_run_segment() {
        assert_eq!(run_segment("validator_5/r1/config.json"), Some("r1"));
        assert_eq!(run_segment("validator_5/r1/entries/0000000000.json"), Some("r1"));
        assert_eq!(run_segment("validator_5/r1"), None);
        assert_eq!(run_segment("junk/r1/config.json"), None);
    }

    #[test]
    fn test_run_id_validation() {
        assert!(RunId::new("abc").is_ok());
        assert!(RunId::new("").is_err());
        assert!(RunId::new("a/b").is_err());
        assert!(RunId::new("..").is_err());
        assert!(RunId::new("a\nb").is_err());
        assert!(RunId::new("v1.2_retry-3").is_ok());
        for id in ["run#1", "50%", "a b", "[x]", "<x>", "a|b", "r\u{e9}sum\u{e9}", "a\\b"] {
            let err = RunId::new(id).unwrap_err();
            assert!(matches!(err, LogStoreError::InvalidRunId { .. }), "{:?}", id);
        }

        let parsed: RunId = serde_json::from_str("\"run-1\"").unwrap();
        assert_eq!(parsed.as_str(), "run-1");
        assert!(serde_json::from_str::<RunId>("\"x/y\"").is_err());
    }

    #[test]
    fn test_generated_run_ids_sort_by_time() {
        let earlier = RunId::generate(LogTimestamp::from_millis(1_704_164_645_006), 0xffff_ffff);
        let later = RunId::generate(LogTimestamp::from_millis(1_704_164_645_007), 0);
        assert_eq!(earlier.as_str(), "20240102T030405006Z-ffffffff");
        assert!(earlier < later);
        assert_eq!(earlier.as_str().len(), later.as_str().len());
    }

    #[test]
    fn test_list_order_equals_write_order_past_1000() {
        let r = run();
        let mut seqs: Vec<u64> = (0..=1_500).collect();
        seqs.extend([9_999, 10_000, 99_999_999, 999_999_999, 1_000_000_000, SEQ_MAX]);

        let written: Vec<String> = seqs.iter().map(|s| entries_key(9, &r, *s)).collect();
        let mut listed = written.clone();
        listed.sort();
        assert_eq!(listed, written);

        let stdout_written: Vec<String> = seqs.iter().map(|s| stdout_key(9, &r, *s)).collect();
        let mut stdout_listed = stdout_written.clone();
        stdout_listed.sort();
        assert_eq!(stdout_listed, stdout_written);
    }
}
