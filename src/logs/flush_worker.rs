//! Periodic flusher
//!
//! Quiet runs never hit the batch-size threshold, and the age threshold is
//! only checked when something is appended. `FlushWorker` flushes a shared
//! writer on a fixed tick so buffered records become visible to readers
//! within one interval.

use crate::logs::writer::LogWriter;
use crate::storage::clock::LogClock;
use crate::storage::object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

pub struct FlushWorker<S: ObjectStore, C: LogClock> {
    writer: Arc<LogWriter<S, C>>,
    period: Duration,
    shutdown_rx: oneshot::Receiver<()>,
}

/// Handle for stopping a spawned `FlushWorker`
pub struct FlushWorkerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl FlushWorkerHandle {
    /// Stop the worker and wait for an in-flight flush to complete
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.join).await;
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

impl<S: ObjectStore, C: LogClock> FlushWorker<S, C> {
    /// Spawn onto the current runtime, flushing every `period`
    pub fn spawn(writer: Arc<LogWriter<S, C>>, period: Duration) -> FlushWorkerHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = FlushWorker {
            writer,
            period: period.max(Duration::from_millis(1)),
            shutdown_rx,
        };
        let join = tokio::spawn(worker.run());
        FlushWorkerHandle {
            shutdown_tx: Some(shutdown_tx),
            join,
        }
    }

    /// Runs until shut down or until the writer's run is closed
    async fn run(mut self) {
        let mut tick = interval(self.period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.writer.flush().await {
                        warn!(uid = self.writer.uid(), error = %e, "Periodic flush failed");
                    }
                    if !self.writer.is_open() && self.writer.run_id().is_some() {
                        debug!(uid = self.writer.uid(), "Run closed, flush worker exiting");
                        break;
                    }
                }
                _ = &mut self.shutdown_rx => {
                    debug!(uid = self.writer.uid(), "Flush worker shut down");
                    break;
                }
            }
        }
    }
}
