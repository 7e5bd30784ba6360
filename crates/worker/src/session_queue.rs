//! Bounded queue of finished sessions awaiting an incremental update.
//!
//! Producers hand over session ids as sessions close; a fixed pool of
//! consumers drains the queue and applies each session's transitions.
//! Updates for the same project serialize on the engine's project lock.

use std::sync::Arc;

use aggregator::{TransitionEngine, UpdateOutcome};
use telemetry::metrics;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("session queue is full")]
    Full,
    #[error("session queue is closed")]
    Closed,
}

/// Sending half of the session update queue.
#[derive(Clone)]
pub struct SessionQueue {
    tx: mpsc::Sender<String>,
}

impl SessionQueue {
    /// Creates the queue and spawns `workers` consumers.
    ///
    /// Consumers exit once every `SessionQueue` clone has been dropped and the
    /// queue is drained.
    pub fn start(
        engine: TransitionEngine,
        capacity: usize,
        workers: usize,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (queue, rx) = Self::channel(capacity);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers.max(1))
            .map(|worker_id| {
                let engine = engine.clone();
                let rx = rx.clone();
                tokio::spawn(async move { consume(worker_id, engine, rx).await })
            })
            .collect();

        info!(capacity, workers, "Session update queue started");
        (queue, handles)
    }

    /// Queue handle and receiver without any consumers attached.
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Waits for room in the queue.
    pub async fn enqueue(&self, session_id: impl Into<String>) -> Result<(), QueueError> {
        // Counted before the send so a consumer's decrement never comes first
        metrics().session_queue_depth.inc();
        if self.tx.send(session_id.into()).await.is_err() {
            metrics().session_queue_depth.dec();
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// Enqueues without waiting; fails when the queue is at capacity.
    pub fn try_enqueue(&self, session_id: impl Into<String>) -> Result<(), QueueError> {
        metrics().session_queue_depth.inc();
        self.tx.try_send(session_id.into()).map_err(|e| {
            metrics().session_queue_depth.dec();
            match e {
                mpsc::error::TrySendError::Full(_) => QueueError::Full,
                mpsc::error::TrySendError::Closed(_) => QueueError::Closed,
            }
        })
    }

    pub fn remaining_capacity(&self) -> usize {
        self.tx.capacity()
    }
}

async fn consume(
    worker_id: usize,
    engine: TransitionEngine,
    rx: Arc<Mutex<mpsc::Receiver<String>>>,
) {
    loop {
        // Hold the receiver only while waiting for the next id
        let next = rx.lock().await.recv().await;
        let Some(session_id) = next else {
            debug!(worker_id, "Session queue closed, consumer exiting");
            return;
        };
        metrics().session_queue_depth.dec();

        match engine.update_transitions_for_session(&session_id).await {
            Ok(UpdateOutcome::Applied { project_id, pairs, .. }) => {
                debug!(worker_id, session_id = %session_id, project_id = %project_id, pairs, "Session applied");
            }
            Ok(UpdateOutcome::Skipped { reason }) => {
                debug!(worker_id, session_id = %session_id, ?reason, "Session skipped");
            }
            Err(e) => {
                error!(worker_id, session_id = %session_id, error = %e, "Incremental update failed");
            }
        }
    }
}
