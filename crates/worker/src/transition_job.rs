//! Transition job: full recompute sweep across every project.
//!
//! Projects are independent, so they are recomputed in parallel up to a
//! fixed limit. A failing project is logged and recorded in the report;
//! it never aborts the sweep.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use aggregator::{RecomputeSummary, TransitionEngine};
use telemetry::metrics;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{error, info, warn};
use transition_core::Result;

/// A project that failed during a sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectFailure {
    pub project_id: String,
    pub error: String,
}

/// Outcome of one sweep over all projects.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub succeeded: Vec<RecomputeSummary>,
    pub failed: Vec<ProjectFailure>,
    pub elapsed_ms: u64,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Recomputes transitions for every project with bounded concurrency.
pub struct TransitionJob {
    engine: TransitionEngine,
    max_concurrent: usize,
}

impl TransitionJob {
    pub fn new(engine: TransitionEngine, max_concurrent: usize) -> Self {
        Self {
            engine,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Runs one sweep.
    ///
    /// Only listing the projects can fail the sweep as a whole.
    pub async fn run(&self) -> Result<SweepReport> {
        let start = Instant::now();
        let projects = self.engine.event_store().list_projects().await?;
        info!(projects = projects.len(), "Running transition sweep");

        let permits = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks = JoinSet::new();
        let mut task_projects: HashMap<task::Id, String> = HashMap::new();

        for project_id in projects {
            let engine = self.engine.clone();
            let permits = permits.clone();
            let task_project = project_id.clone();
            let handle = tasks.spawn(async move {
                // Held until the recompute finishes; the semaphore is never closed
                let _permit = permits.acquire_owned().await;
                engine.compute_transitions_for_project(&project_id).await
            });
            task_projects.insert(handle.id(), task_project);
        }

        let mut report = SweepReport::default();
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, outcome) = match joined {
                Ok((id, result)) => (id, result.map_err(|e| e.to_string())),
                Err(e) => {
                    error!(error = %e, "Recompute task panicked");
                    (e.id(), Err(e.to_string()))
                }
            };
            let project_id = task_projects.remove(&id).unwrap_or_default();

            match outcome {
                Ok(summary) => report.succeeded.push(summary),
                Err(error) => {
                    warn!(project_id = %project_id, error = %error, "Project recompute failed, continuing sweep");
                    metrics().sweep_project_failures.inc();
                    report.failed.push(ProjectFailure { project_id, error });
                }
            }
        }

        report.succeeded.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        report.failed.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        report.elapsed_ms = start.elapsed().as_millis() as u64;
        metrics().sweeps_completed.inc();

        // Locks for projects that finished are no longer needed
        self.engine.locks().prune();

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            elapsed_ms = report.elapsed_ms,
            "Transition sweep complete"
        );
        Ok(report)
    }
}
