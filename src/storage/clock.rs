//! Clock Abstraction for Deterministic Simulation Testing
//!
//! Writer timestamps, run ids and flush intervals all read time through
//! `LogClock`, so simulation tests can drive time explicitly.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Wall-clock timestamp in Unix milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogTimestamp(pub u64);

impl LogTimestamp {
    pub const ZERO: LogTimestamp = LogTimestamp(0);

    pub fn from_millis(ms: u64) -> Self {
        LogTimestamp(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }

    pub fn saturating_sub(&self, other: LogTimestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(other.0))
    }

    fn to_datetime(self) -> DateTime<Utc> {
        let ms = i64::try_from(self.0).unwrap_or(i64::MAX);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// ISO-8601 / RFC 3339 with millisecond precision, e.g. `2026-10-18T09:30:00.125Z`.
    ///
    /// Fixed width, so string order equals time order.
    pub fn to_iso8601(&self) -> String {
        self.to_datetime().to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Compact sortable form used as the run id prefix, e.g. `20261018T093000125Z`
    pub fn to_compact(&self) -> String {
        self.to_datetime().format("%Y%m%dT%H%M%S%3fZ").to_string()
    }
}

impl std::ops::Add<Duration> for LogTimestamp {
    type Output = LogTimestamp;

    fn add(self, rhs: Duration) -> Self::Output {
        LogTimestamp(self.0.saturating_add(rhs.as_millis() as u64))
    }
}

/// Clock trait for time operations
///
/// Implementations:
/// - `ProductionClock`: Uses real system time
/// - `SimulatedClock`: Uses controlled virtual time for DST
pub trait LogClock: Send + Sync + Clone + 'static {
    fn now(&self) -> LogTimestamp;

    fn elapsed(&self, since: LogTimestamp) -> Duration {
        self.now().saturating_sub(since)
    }

    fn has_elapsed(&self, since: LogTimestamp, duration: Duration) -> bool {
        self.elapsed(since) >= duration
    }
}

/// Production clock: wall time sampled once, advanced by a monotonic `Instant`
#[derive(Clone)]
pub struct ProductionClock {
    start: Instant,
    start_millis: u64,
}

impl Default for ProductionClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductionClock {
    pub fn new() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let start_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        ProductionClock {
            start: Instant::now(),
            start_millis,
        }
    }
}

impl LogClock for ProductionClock {
    fn now(&self) -> LogTimestamp {
        let elapsed = self.start.elapsed().as_millis() as u64;
        LogTimestamp(self.start_millis.saturating_add(elapsed))
    }
}

/// Simulated clock for deterministic testing
///
/// Time only advances when explicitly told to via `advance()` or `set()`.
#[derive(Clone)]
pub struct SimulatedClock {
    time_ms: Arc<AtomicU64>,
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimulatedClock {
    pub fn new(start_ms: u64) -> Self {
        SimulatedClock {
            time_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.time_ms.fetch_add(ms, Ordering::SeqCst);
    }

    pub fn set(&self, time_ms: u64) {
        self.time_ms.store(time_ms, Ordering::SeqCst);
    }
}

impl LogClock for SimulatedClock {
    fn now(&self) -> LogTimestamp {
        LogTimestamp(self.time_ms.load(Ordering::SeqCst))
    }
}
