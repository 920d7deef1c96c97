//! Simulated Object Store with Fault Injection
//!
//! DST-compatible wrapper that injects faults using buggify.
//! Follows FoundationDB patterns for deterministic simulation testing.
//!
//! Fault model:
//! - PUT may fail before applying, or apply and then lose the acknowledgement
//! - PUT may persist a truncated body
//! - GET may fail or return a flipped byte
//! - LIST may fail or return a stale, truncated view (eventual consistency)
//! - any operation may time out

use crate::buggify::faults::object_store as faults;
use crate::io::Rng;
use crate::storage::object_store::{ListResult, ObjectStore, StoreFuture};
use parking_lot::Mutex;
use std::io::{Error as IoError, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for simulated fault injection
#[derive(Debug, Clone)]
pub struct SimulatedStoreConfig {
    /// Probability of PUT failing without side effects
    pub put_fail_prob: f64,
    /// Probability of PUT applying but reporting failure
    pub put_ack_lost_prob: f64,
    /// Probability of PUT persisting a truncated body
    pub partial_write_prob: f64,
    /// Probability of GET operation failure
    pub get_fail_prob: f64,
    /// Probability of GET returning corrupted data
    pub get_corrupt_prob: f64,
    /// Probability of LIST operation failure
    pub list_fail_prob: f64,
    /// Probability of LIST returning a stale prefix of the real result
    pub list_stale_prob: f64,
    /// Probability of operation timeout
    pub timeout_prob: f64,
    /// Simulated latency range in microseconds (min, max)
    pub latency_range_us: (u64, u64),
}

impl Default for SimulatedStoreConfig {
    fn default() -> Self {
        SimulatedStoreConfig {
            put_fail_prob: 0.01,        // 1%
            put_ack_lost_prob: 0.005,   // 0.5%
            partial_write_prob: 0.0,    // opt-in: loses data permanently
            get_fail_prob: 0.01,        // 1%
            get_corrupt_prob: 0.0,      // opt-in
            list_fail_prob: 0.01,       // 1%
            list_stale_prob: 0.02,      // 2%
            timeout_prob: 0.005,        // 0.5%
            latency_range_us: (0, 200), // up to 0.2ms
        }
    }
}

impl SimulatedStoreConfig {
    /// High chaos configuration for stress testing
    pub fn high_chaos() -> Self {
        SimulatedStoreConfig {
            put_fail_prob: 0.10,
            put_ack_lost_prob: 0.05,
            partial_write_prob: 0.0,
            get_fail_prob: 0.10,
            get_corrupt_prob: 0.0,
            list_fail_prob: 0.05,
            list_stale_prob: 0.10,
            timeout_prob: 0.05,
            latency_range_us: (0, 1_000),
        }
    }

    /// Data-destroying faults on top of the default rates
    pub fn with_corruption() -> Self {
        SimulatedStoreConfig {
            partial_write_prob: 0.02,
            get_corrupt_prob: 0.02,
            ..Self::default()
        }
    }

    /// No faults - for baseline testing
    pub fn no_faults() -> Self {
        SimulatedStoreConfig {
            put_fail_prob: 0.0,
            put_ack_lost_prob: 0.0,
            partial_write_prob: 0.0,
            get_fail_prob: 0.0,
            get_corrupt_prob: 0.0,
            list_fail_prob: 0.0,
            list_stale_prob: 0.0,
            timeout_prob: 0.0,
            latency_range_us: (0, 0),
        }
    }

    /// Whether stored data can end up unreadable
    pub fn destroys_data(&self) -> bool {
        self.partial_write_prob > 0.0 || self.get_corrupt_prob > 0.0
    }
}

/// Statistics for fault injection
#[derive(Debug, Clone, Default)]
pub struct SimulatedStoreStats {
    pub put_attempts: u64,
    pub put_failures: u64,
    pub put_acks_lost: u64,
    pub partial_writes: u64,
    pub get_attempts: u64,
    pub get_failures: u64,
    pub get_corruptions: u64,
    pub list_attempts: u64,
    pub list_failures: u64,
    pub list_stale: u64,
    pub timeouts: u64,
}

impl SimulatedStoreStats {
    pub fn total_faults(&self) -> u64 {
        self.put_failures
            + self.put_acks_lost
            + self.partial_writes
            + self.get_failures
            + self.get_corruptions
            + self.list_failures
            + self.list_stale
            + self.timeouts
    }
}

struct SimulatedStoreInner<R: Rng> {
    rng: R,
    stats: SimulatedStoreStats,
}

/// Simulated object store that wraps another store and injects faults
pub struct SimulatedObjectStore<S: ObjectStore, R: Rng> {
    inner_store: S,
    config: SimulatedStoreConfig,
    state: Arc<Mutex<SimulatedStoreInner<R>>>,
}

impl<S: ObjectStore + Clone, R: Rng> Clone for SimulatedObjectStore<S, R> {
    fn clone(&self) -> Self {
        SimulatedObjectStore {
            inner_store: self.inner_store.clone(),
            config: self.config.clone(),
            state: self.state.clone(),
        }
    }
}

impl<S: ObjectStore, R: Rng> SimulatedObjectStore<S, R> {
    /// Create a new simulated store with the given RNG
    pub fn new(inner_store: S, rng: R, config: SimulatedStoreConfig) -> Self {
        SimulatedObjectStore {
            inner_store,
            config,
            state: Arc::new(Mutex::new(SimulatedStoreInner {
                rng,
                stats: SimulatedStoreStats::default(),
            })),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner_store
    }

    pub fn config(&self) -> &SimulatedStoreConfig {
        &self.config
    }

    /// Get current statistics
    pub fn stats(&self) -> SimulatedStoreStats {
        self.state.lock().stats.clone()
    }

    /// Reset statistics
    pub fn reset_stats(&self) {
        self.state.lock().stats = SimulatedStoreStats::default();
    }

    fn roll(&self, fault_id: &str, probability: f64) -> bool {
        let mut state = self.state.lock();
        crate::buggify!(&mut state.rng, fault_id, probability)
    }

    fn record(&self, update: impl FnOnce(&mut SimulatedStoreStats)) {
        update(&mut self.state.lock().stats);
    }

    fn gen_range(&self, min: u64, max: u64) -> u64 {
        self.state.lock().rng.gen_range(min, max)
    }

    async fn latency(&self) {
        let (min, max) = self.config.latency_range_us;
        let latency_us = if max > min { self.gen_range(min, max) } else { min };
        if latency_us > 0 {
            tokio::time::sleep(Duration::from_micros(latency_us)).await;
        }
    }

    fn check_timeout(&self) -> Result<(), IoError> {
        if self.roll(faults::TIMEOUT, self.config.timeout_prob) {
            self.record(|s| s.timeouts += 1);
            return Err(IoError::new(ErrorKind::TimedOut, "simulated timeout"));
        }
        Ok(())
    }
}

impl<S: ObjectStore, R: Rng> ObjectStore for SimulatedObjectStore<S, R> {
    fn put<'a>(&'a self, key: &'a str, data: &'a [u8]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.record(|s| s.put_attempts += 1);
            self.check_timeout()?;

            if self.roll(faults::PUT_FAIL, self.config.put_fail_prob) {
                self.record(|s| s.put_failures += 1);
                return Err(IoError::new(ErrorKind::Other, "simulated put failure"));
            }

            self.latency().await;

            let partial = data.len() > 1
                && self.roll(faults::PARTIAL_WRITE, self.config.partial_write_prob);
            if partial {
                self.record(|s| s.partial_writes += 1);
                let new_len = self.gen_range(1, data.len() as u64) as usize;
                self.inner_store.put(key, &data[..new_len]).await?;
            } else {
                self.inner_store.put(key, data).await?;
            }

            if self.roll(faults::PUT_ACK_LOST, self.config.put_ack_lost_prob) {
                self.record(|s| s.put_acks_lost += 1);
                return Err(IoError::new(
                    ErrorKind::ConnectionReset,
                    "simulated lost acknowledgement",
                ));
            }
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move {
            self.record(|s| s.get_attempts += 1);
            self.check_timeout()?;

            if self.roll(faults::GET_FAIL, self.config.get_fail_prob) {
                self.record(|s| s.get_failures += 1);
                return Err(IoError::new(ErrorKind::Other, "simulated get failure"));
            }

            self.latency().await;
            let mut data = self.inner_store.get(key).await?;

            if !data.is_empty() && self.roll(faults::GET_CORRUPT, self.config.get_corrupt_prob) {
                self.record(|s| s.get_corruptions += 1);
                let idx = self.gen_range(0, data.len() as u64) as usize;
                data[idx] ^= 0xFF;
            }
            Ok(data)
        })
    }

    fn exists<'a>(&'a self, key: &'a str) -> StoreFuture<'a, bool> {
        Box::pin(async move {
            self.check_timeout()?;
            self.inner_store.exists(key).await
        })
    }

    fn list<'a>(
        &'a self,
        prefix: &'a str,
        continuation_token: Option<&'a str>,
    ) -> StoreFuture<'a, ListResult> {
        Box::pin(async move {
            self.record(|s| s.list_attempts += 1);
            self.check_timeout()?;

            if self.roll(faults::LIST_FAIL, self.config.list_fail_prob) {
                self.record(|s| s.list_failures += 1);
                return Err(IoError::new(ErrorKind::Other, "simulated list failure"));
            }

            self.latency().await;
            let mut result = self.inner_store.list(prefix, continuation_token).await?;

            // A stale view hides the newest keys and ends the listing early
            if !result.objects.is_empty()
                && self.roll(faults::LIST_STALE, self.config.list_stale_prob)
            {
                self.record(|s| s.list_stale += 1);
                let keep = self.gen_range(0, result.objects.len() as u64) as usize;
                result.objects.truncate(keep);
                result.continuation_token = None;
            }
            Ok(result)
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.check_timeout()?;
            self.inner_store.health_check().await
        })
    }
}
