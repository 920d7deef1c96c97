//! Tracing setup for binaries
//!
//! Library code only emits `tracing` events; installing a subscriber is left
//! to the process entry point.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | LOGSTORE_LOG | info | `EnvFilter` directives |
//! | LOGSTORE_LOG_FORMAT | text | `text` or `json` |

use crate::logs::error::{LogStoreError, LogStoreResult};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = LogStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(LogStoreError::Config(format!("unknown log format `{}`", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub filter: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        TracingConfig {
            filter: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

impl TracingConfig {
    /// Unset or unparsable variables fall back to the defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        TracingConfig {
            filter: std::env::var("LOGSTORE_LOG").unwrap_or(defaults.filter),
            format: std::env::var("LOGSTORE_LOG_FORMAT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.format),
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Install the global subscriber, writing to stderr so command output on
/// stdout stays machine-readable. Fails if one is already installed.
pub fn init_tracing(config: &TracingConfig) -> LogStoreResult<()> {
    let filter = EnvFilter::try_new(&config.filter)
        .map_err(|e| LogStoreError::Config(format!("bad log filter `{}`: {}", config.filter, e)))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|e| LogStoreError::Config(format!("tracing already initialized: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_bad_filter_rejected() {
        let config = TracingConfig::default().with_filter("info,[[");
        assert!(matches!(init_tracing(&config), Err(LogStoreError::Config(_))));
    }
}
