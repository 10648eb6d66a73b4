//! The single clearinghouse consumer task.
//!
//! Orders reach the worker through a bounded queue of [`OrderId`]s. The
//! worker settles them one at a time in queue order. On shutdown it stops
//! admitting new orders, drains and settles whatever is already queued,
//! and returns a [`WorkerReport`].

use guild_db::DocumentStore;
use guild_types::OrderId;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::settle::{ClearinghouseDeps, Outcome, settle};
use crate::error::GameError;

/// Counts reported by the worker when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    /// Orders that settled with effects applied.
    pub executed: u64,
    /// Orders cancelled because spot was below target.
    pub cancelled: u64,
    /// Orders whose settlement failed and left a dead letter.
    pub dead_lettered: u64,
}

impl WorkerReport {
    const fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Executed { .. } => self.executed = self.executed.saturating_add(1),
            Outcome::Cancelled { .. } => self.cancelled = self.cancelled.saturating_add(1),
            Outcome::Failed => self.dead_lettered = self.dead_lettered.saturating_add(1),
        }
    }
}

/// Sending side of the worker queue.
#[derive(Debug, Clone)]
pub struct OrderQueue {
    sender: mpsc::Sender<OrderId>,
}

impl OrderQueue {
    /// Wait for a free queue slot.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Internal`] once the worker has shut down.
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, OrderId>, GameError> {
        self.sender
            .reserve()
            .await
            .map_err(|err| GameError::Internal(format!("clearinghouse queue closed: {err}")))
    }
}

/// Owner-side handle to the running worker.
#[derive(Debug)]
pub struct ClearinghouseHandle {
    queue: OrderQueue,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<WorkerReport>,
}

impl ClearinghouseHandle {
    /// A sender for the worker queue.
    pub fn queue(&self) -> OrderQueue {
        self.queue.clone()
    }

    /// Signal shutdown and wait for the worker to drain and exit.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::Internal`] if the worker task panicked or was
    /// aborted.
    pub async fn shutdown(self) -> Result<WorkerReport, GameError> {
        if self.shutdown.send(true).is_err() {
            debug!("clearinghouse worker already stopped");
        }
        drop(self.queue);
        self.join
            .await
            .map_err(|err| GameError::Internal(format!("clearinghouse worker failed: {err}")))
    }
}

/// Spawn the worker with a queue admitting `capacity` orders.
pub fn spawn<S: DocumentStore>(deps: ClearinghouseDeps<S>, capacity: usize) -> ClearinghouseHandle {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let (shutdown, shutdown_rx) = watch::channel(false);
    let join = tokio::spawn(run(deps, receiver, shutdown_rx));
    info!(capacity, "clearinghouse worker started");
    ClearinghouseHandle {
        queue: OrderQueue { sender },
        shutdown,
        join,
    }
}

async fn run<S: DocumentStore>(
    deps: ClearinghouseDeps<S>,
    mut receiver: mpsc::Receiver<OrderId>,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerReport {
    let mut report = WorkerReport::default();

    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = receiver.recv() => {
                let Some(id) = next else { break };
                report.record(settle(&deps, id).await);
            }
        }
    }

    receiver.close();
    while let Some(id) = receiver.recv().await {
        report.record(settle(&deps, id).await);
    }

    info!(
        executed = report.executed,
        cancelled = report.cancelled,
        dead_lettered = report.dead_lettered,
        "clearinghouse worker stopped"
    );
    report
}
