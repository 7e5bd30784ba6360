//! Worker scheduler for background tasks.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use aggregator::TransitionEngine;
use telemetry::{health, metrics};
use transition_core::limits::{
    DEFAULT_MAX_CONCURRENT_PROJECTS, DEFAULT_SESSION_IDLE_SECS, DEFAULT_SESSION_QUEUE_CAPACITY,
};

use crate::session_poll::SessionPoller;
use crate::session_queue::SessionQueue;
use crate::transition_job::TransitionJob;

/// Worker scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Seconds between full recompute sweeps; 0 disables the sweep
    pub sweep_interval_secs: u64,
    /// Projects recomputed in parallel during a sweep
    pub max_concurrent_projects: usize,
    pub session_queue_capacity: usize,
    pub session_workers: usize,
    /// Seconds between polls for closed sessions; 0 disables the poller
    pub session_poll_interval_secs: u64,
    /// Inactivity after which a session counts as closed
    pub session_idle_secs: u64,
    /// Seconds between metrics snapshots in the log
    pub metrics_log_interval_secs: u64,
    /// How long shutdown waits for running work before aborting it
    pub shutdown_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 3600, // 1 hour
            max_concurrent_projects: DEFAULT_MAX_CONCURRENT_PROJECTS,
            session_queue_capacity: DEFAULT_SESSION_QUEUE_CAPACITY,
            session_workers: 2,
            session_poll_interval_secs: 60,
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            metrics_log_interval_secs: 60, // 1 minute
            shutdown_timeout_secs: 30,
        }
    }
}

impl WorkerConfig {
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn session_poll_interval(&self) -> Option<Duration> {
        (self.session_poll_interval_secs > 0)
            .then(|| Duration::from_secs(self.session_poll_interval_secs))
    }

    pub fn session_idle(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_idle_secs.min(i64::MAX as u64) as i64)
    }

    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_log_interval_secs.max(1))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Running workers: the session queue handle plus every task spawned.
pub struct RunningWorkers {
    pub queue: SessionQueue,
    consumers: Vec<JoinHandle<()>>,
    tickers: Vec<JoinHandle<()>>,
    cancel: CancellationToken,
    shutdown_timeout: Duration,
}

impl RunningWorkers {
    /// Stops the periodic tasks, then lets the session consumers drain the
    /// queue.
    ///
    /// A sweep or poll already running finishes first. Work still running
    /// when the shutdown timeout expires is aborted.
    pub async fn shutdown(self) {
        let deadline = Instant::now() + self.shutdown_timeout;

        self.cancel.cancel();
        if !join_until(self.tickers, deadline).await {
            warn!("Periodic workers did not stop in time, aborted");
        }

        // Consumers exit once the last queue handle is gone and the queue is empty
        drop(self.queue);
        if join_until(self.consumers, deadline).await {
            info!("Session queue drained");
        } else {
            warn!("Session queue not drained in time, remaining sessions dropped");
        }
    }
}

/// Awaits every task until `deadline`, aborting whatever is still running
/// after it. Returns whether all tasks finished on their own.
async fn join_until(handles: Vec<JoinHandle<()>>, deadline: Instant) -> bool {
    let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
    let joined = tokio::time::timeout_at(deadline, async {
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Worker task failed");
            }
        }
    })
    .await;

    if joined.is_err() {
        for abort in aborts {
            abort.abort();
        }
        return false;
    }
    true
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    engine: TransitionEngine,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, engine: TransitionEngine) -> Self {
        Self { config, engine }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> RunningWorkers {
        let cancel = CancellationToken::new();
        let (queue, consumers) = SessionQueue::start(
            self.engine.clone(),
            self.config.session_queue_capacity,
            self.config.session_workers,
        );
        let mut tickers = Vec::new();

        match self.config.sweep_interval() {
            Some(period) => {
                let scheduler = self.clone();
                let cancel = cancel.clone();
                tickers.push(tokio::spawn(async move {
                    scheduler.run_transition_sweep(period, cancel).await;
                }));
                info!(interval_secs = period.as_secs(), "Transition sweep worker started");
            }
            None => warn!("Transition sweep disabled"),
        }

        match self.config.session_poll_interval() {
            Some(period) => {
                let poller = SessionPoller::new(
                    self.engine.event_store().clone(),
                    queue.clone(),
                    self.config.session_idle(),
                    Utc::now(),
                );
                let cancel = cancel.clone();
                tickers.push(tokio::spawn(async move {
                    run_session_poll(poller, period, cancel).await;
                }));
                info!(
                    interval_secs = period.as_secs(),
                    idle_secs = self.config.session_idle_secs,
                    "Closed session poller started"
                );
            }
            None => warn!("Closed session poller disabled"),
        }

        let scheduler = self.clone();
        let metrics_cancel = cancel.clone();
        tickers.push(tokio::spawn(async move {
            scheduler.run_metrics_log(metrics_cancel).await;
        }));

        health().workers.set_healthy();
        info!("Background workers started");
        RunningWorkers {
            queue,
            consumers,
            tickers,
            cancel,
            shutdown_timeout: self.config.shutdown_timeout(),
        }
    }

    async fn run_transition_sweep(&self, period: Duration, cancel: CancellationToken) {
        let job = TransitionJob::new(self.engine.clone(), self.config.max_concurrent_projects);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            match job.run().await {
                Ok(report) if report.is_partial() => {
                    health().workers.set_healthy();
                    warn!(
                        failed = report.failed.len(),
                        total = report.total(),
                        "Transition sweep finished with failures"
                    );
                }
                Ok(_) => health().workers.set_healthy(),
                Err(e) => {
                    health().workers.set_unhealthy(format!("sweep failed: {}", e));
                    error!("Transition sweep error: {}", e);
                }
            }
        }
    }

    async fn run_metrics_log(&self, cancel: CancellationToken) {
        let mut ticker = interval(self.config.metrics_log_interval());

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let snapshot = metrics().snapshot();
            info!(
                recomputes_completed = snapshot.recomputes_completed,
                recompute_errors = snapshot.recompute_errors,
                recompute_timeouts = snapshot.recompute_timeouts,
                incremental_updates = snapshot.incremental_updates,
                incremental_errors = snapshot.incremental_errors,
                transitions_written = snapshot.transitions_written,
                graphs_built = snapshot.graphs_built,
                session_queue_depth = snapshot.session_queue_depth,
                recompute_latency_mean_ms = snapshot.recompute_latency_mean_ms,
                "Metrics snapshot"
            );
        }
    }
}

async fn run_session_poll(mut poller: SessionPoller, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        if let Err(e) = poller.poll_once(Utc::now()).await {
            warn!(error = %e, watermark = %poller.watermark(), "Closed session poll failed, retrying next tick");
        }
    }
}
