//! Stored record shapes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Open key-value document; callers log heterogeneous event shapes
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Payload keys the writer interprets
pub const RESERVED_STEP: &str = "step";
pub const RESERVED_TIMESTAMP: &str = "timestamp";
/// Payload key read as the severity of a structured entry
pub const LEVEL_FIELD: &str = "level";

/// Structured entry: `{step, timestamp, payload}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub step: u64,
    /// ISO-8601, writer clock
    pub timestamp: String,
    pub payload: Payload,
}

impl LogEntry {
    /// Severity recorded in the payload's `level` field, if any
    pub fn level(&self) -> Option<&str> {
        self.payload.get(LEVEL_FIELD).and_then(|v| v.as_str())
    }

    pub fn matches_level(&self, filter: Option<&str>) -> bool {
        level_matches(self.level(), filter)
    }
}

/// Human-readable stdout line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn matches_level(&self, filter: Option<&str>) -> bool {
        level_matches(Some(self.level.as_str()), filter)
    }
}

/// Case-insensitive exact name match; no filter matches everything and an
/// unlabeled record matches no filter
fn level_matches(level: Option<&str>, filter: Option<&str>) -> bool {
    match filter {
        Some(filter) => level.is_some_and(|level| level.eq_ignore_ascii_case(filter)),
        None => true,
    }
}

/// Stdout severity. Unknown names are kept verbatim as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Success,
    Other(String),
}

impl LogLevel {
    pub fn as_str(&self) -> &str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Success => "SUCCESS",
            LogLevel::Other(name) => name,
        }
    }

    pub fn parse(name: &str) -> LogLevel {
        match name.to_ascii_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "WARNING" => LogLevel::Warning,
            "ERROR" => LogLevel::Error,
            "SUCCESS" => LogLevel::Success,
            _ => LogLevel::Other(name.to_string()),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for LogLevel {
    fn from(name: &str) -> Self {
        LogLevel::parse(name)
    }
}

impl Serialize for LogLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(LogLevel::parse(&name))
    }
}

/// One item of a merged fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogRecord {
    Entry(LogEntry),
    Line(LogLine),
}

impl LogRecord {
    pub fn as_entry(&self) -> Option<&LogEntry> {
        match self {
            LogRecord::Entry(e) => Some(e),
            LogRecord::Line(_) => None,
        }
    }

    pub fn as_line(&self) -> Option<&LogLine> {
        match self {
            LogRecord::Line(l) => Some(l),
            LogRecord::Entry(_) => None,
        }
    }
}

/// Body of the `_finished` marker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedMarker {
    pub finished_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_level_parse_is_case_insensitive() {
        assert_eq!(LogLevel::parse("error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("Warning"), LogLevel::Warning);
        assert_eq!(LogLevel::parse("TRACE"), LogLevel::Other("TRACE".to_string()));
    }

    #[test]
    fn test_line_level_filter() {
        let line = |level: LogLevel| LogLine {
            timestamp: "t".to_string(),
            level,
            message: "m".to_string(),
        };
        assert!(line(LogLevel::Other("Trace".to_string())).matches_level(Some("trace")));
        assert!(line(LogLevel::Warning).matches_level(Some("warning")));
        assert!(!line(LogLevel::Info).matches_level(Some("INF")));
        assert!(line(LogLevel::Info).matches_level(None));
    }

    #[test]
    fn test_level_serializes_as_name() {
        let line = LogLine {
            timestamp: "2024-01-01T00:00:00.000Z".to_string(),
            level: LogLevel::Success,
            message: "done".to_string(),
        };
        let text = serde_json::to_string(&line).unwrap();
        assert!(text.contains("\"level\":\"SUCCESS\""));

        let custom: LogLine = serde_json::from_str(
            r#"{"timestamp":"t","level":"notice","message":"m"}"#,
        )
        .unwrap();
        assert_eq!(custom.level.as_str(), "notice");
    }

    #[test]
    fn test_entry_level_from_payload() {
        let entry = LogEntry {
            step: 0,
            timestamp: "t".to_string(),
            payload: payload(json!({"level": "ERROR", "loss": 0.5})),
        };
        assert_eq!(entry.level(), Some("ERROR"));

        assert!(entry.matches_level(Some("error")));
        assert!(!entry.matches_level(Some("INFO")));
        assert!(entry.matches_level(None));

        let unlabeled = LogEntry {
            step: 1,
            timestamp: "t".to_string(),
            payload: payload(json!({"level": 3})),
        };
        assert!(!unlabeled.matches_level(Some("3")));
        assert!(unlabeled.matches_level(None));
    }

    #[test]
    fn test_record_tagging() {
        let record = LogRecord::Line(LogLine {
            timestamp: "t".to_string(),
            level: LogLevel::Info,
            message: "hello".to_string(),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["kind"], "line");
        assert_eq!(value["message"], "hello");
    }
}
