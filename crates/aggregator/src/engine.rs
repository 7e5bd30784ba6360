//! The transition engine: full recompute, incremental update, percentages.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, instrument, warn};

use telemetry::metrics;
use transition_core::{
    compute_percentages, error::NotFoundCode, session_pairs, Error, EventCategory, EventIdentity,
    EventStore, IdentityRef, IdentityStore, Result, TransitionAggregates, TransitionKey,
    TransitionStore, TransitionWrite,
};

use crate::config::EngineConfig;
use crate::locks::ProjectLocks;

/// Outcome of a full project recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecomputeSummary {
    pub project_id: String,
    pub sessions: usize,
    pub pairs: u64,
    pub transitions_written: usize,
    pub percentages_written: usize,
    pub elapsed_ms: u64,
}

/// Why an incremental update wrote nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SessionNotFound,
    /// Fewer than two distinct events after collapsing
    TooFewEvents,
}

/// Outcome of an incremental single-session update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateOutcome {
    Skipped {
        reason: SkipReason,
    },
    Applied {
        project_id: String,
        pairs: u64,
        transitions_written: usize,
    },
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Aggregated project state waiting to be written, with the project lock held.
struct PreparedRecompute {
    _guard: OwnedMutexGuard<()>,
    sessions: usize,
    aggregates: TransitionAggregates,
}

/// Turns session event streams into persisted, weighted transitions.
///
/// Cheap to clone; clones share stores and the project lock registry.
#[derive(Clone)]
pub struct TransitionEngine {
    pub(crate) events: Arc<dyn EventStore>,
    pub(crate) identities: Arc<dyn IdentityStore>,
    pub(crate) transitions: Arc<dyn TransitionStore>,
    pub(crate) config: EngineConfig,
    locks: Arc<ProjectLocks>,
}

impl TransitionEngine {
    pub fn new(
        events: Arc<dyn EventStore>,
        identities: Arc<dyn IdentityStore>,
        transitions: Arc<dyn TransitionStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            events,
            identities,
            transitions,
            config,
            locks: Arc::new(ProjectLocks::new()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.events
    }

    pub fn locks(&self) -> &ProjectLocks {
        &self.locks
    }

    /// Re-derives every transition of a project from scratch.
    ///
    /// Counts and averages are overwritten, so running it twice without new
    /// events yields identical rows. Rows absent from the new aggregate are
    /// left as they are. The configured deadline bounds loading and
    /// aggregation only; once the upsert starts, it and the percentage batch
    /// always run to completion.
    #[instrument(skip(self))]
    pub async fn compute_transitions_for_project(&self, project_id: &str) -> Result<RecomputeSummary> {
        let start = Instant::now();
        metrics().recomputes_started.inc();
        metrics().active_recomputes.inc();

        let deadline = self.config.recompute_timeout();
        let result = match tokio::time::timeout(deadline, self.aggregate_project(project_id)).await {
            Ok(Ok(prepared)) => self.persist(project_id, prepared, start).await,
            Ok(Err(e)) => Err(e),
            Err(_) => {
                metrics().recompute_timeouts.inc();
                Err(Error::timeout(format!(
                    "recompute for project {} exceeded {}s",
                    project_id,
                    deadline.as_secs()
                )))
            }
        };

        metrics().active_recomputes.dec();
        metrics()
            .recompute_latency_ms
            .observe(start.elapsed().as_millis() as u64);

        match &result {
            Ok(summary) => {
                metrics().recomputes_completed.inc();
                info!(
                    sessions = summary.sessions,
                    pairs = summary.pairs,
                    transitions = summary.transitions_written,
                    elapsed_ms = summary.elapsed_ms,
                    "Recomputed project transitions"
                );
            }
            Err(e) => {
                metrics().recompute_errors.inc();
                warn!(error = %e, "Project recompute failed");
            }
        }

        result
    }

    /// Takes the project lock and aggregates every session. Writes nothing.
    async fn aggregate_project(&self, project_id: &str) -> Result<PreparedRecompute> {
        if !self.events.project_exists(project_id).await? {
            return Err(Error::not_found(
                NotFoundCode::Project,
                format!("project {} not found", project_id),
            ));
        }

        let guard = self.locks.acquire(project_id).await;

        let sessions = self.events.project_sessions(project_id).await?;
        metrics().sessions_scanned.inc_by(sessions.len() as u64);

        let mut aggregates = TransitionAggregates::new();
        for session in &sessions {
            aggregates.extend(&session_pairs(&session.timeline()));
        }

        Ok(PreparedRecompute {
            _guard: guard,
            sessions: sessions.len(),
            aggregates,
        })
    }

    async fn persist(
        &self,
        project_id: &str,
        prepared: PreparedRecompute,
        start: Instant,
    ) -> Result<RecomputeSummary> {
        let writes: Vec<TransitionWrite> = prepared
            .aggregates
            .iter()
            .map(|(from, to, agg)| TransitionWrite::replace(TransitionKey::new(project_id, from, to), *agg))
            .collect();

        let transitions_written = self.write(&writes).await?;
        let percentages_written = self.write_percentages(project_id).await?;

        Ok(RecomputeSummary {
            project_id: project_id.to_string(),
            sessions: prepared.sessions,
            pairs: prepared.aggregates.pair_count(),
            transitions_written,
            percentages_written,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Folds one session's transitions into the existing rows.
    ///
    /// Missing sessions and sessions with fewer than two distinct collapsed
    /// events are a no-op.
    #[instrument(skip(self))]
    pub async fn update_transitions_for_session(&self, session_id: &str) -> Result<UpdateOutcome> {
        let start = Instant::now();
        let result = self.update_session(session_id).await;

        metrics()
            .incremental_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        match &result {
            Ok(UpdateOutcome::Applied { .. }) => metrics().incremental_updates.inc(),
            Ok(UpdateOutcome::Skipped { .. }) => metrics().incremental_noops.inc(),
            Err(e) => {
                metrics().incremental_errors.inc();
                warn!(error = %e, "Incremental update failed");
            }
        }

        result
    }

    async fn update_session(&self, session_id: &str) -> Result<UpdateOutcome> {
        let Some(session) = self.events.session_events(session_id).await? else {
            debug!("Session not found, skipping");
            return Ok(UpdateOutcome::Skipped {
                reason: SkipReason::SessionNotFound,
            });
        };

        let pairs = session_pairs(&session.timeline());
        if pairs.is_empty() {
            debug!(events = session.len(), "Session too short, skipping");
            return Ok(UpdateOutcome::Skipped {
                reason: SkipReason::TooFewEvents,
            });
        }

        let project_id = session.project_id.as_str();
        let aggregates = TransitionAggregates::from_pairs(&pairs);
        let writes: Vec<TransitionWrite> = aggregates
            .iter()
            .map(|(from, to, agg)| TransitionWrite::increment(TransitionKey::new(project_id, from, to), *agg))
            .collect();

        let _guard = self.locks.acquire(project_id).await;
        let transitions_written = self.write(&writes).await?;
        self.write_percentages(project_id).await?;

        debug!(
            project_id = %project_id,
            pairs = pairs.len(),
            transitions = transitions_written,
            "Applied session transitions"
        );

        Ok(UpdateOutcome::Applied {
            project_id: project_id.to_string(),
            pairs: aggregates.pair_count(),
            transitions_written,
        })
    }

    /// Recomputes every percentage of a project.
    pub async fn recompute_percentages(&self, project_id: &str) -> Result<usize> {
        let _guard = self.locks.acquire(project_id).await;
        self.write_percentages(project_id).await
    }

    async fn write(&self, writes: &[TransitionWrite]) -> Result<usize> {
        if writes.is_empty() {
            return Ok(0);
        }
        let written = self.transitions.upsert_transitions(writes).await?;
        metrics().transitions_written.inc_by(written as u64);
        Ok(written)
    }

    /// Caller must hold the project lock.
    async fn write_percentages(&self, project_id: &str) -> Result<usize> {
        let rows = self.transitions.project_transitions(project_id).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let updates = compute_percentages(&rows);
        let written = self.transitions.set_percentages(project_id, &updates).await?;
        if written != updates.len() {
            return Err(Error::write_failed(format!(
                "percentage batch for project {} wrote {} of {} rows",
                project_id,
                written,
                updates.len()
            )));
        }

        metrics().percentage_batches.inc();
        Ok(written)
    }

    /// Whether the project has at least one transition row.
    pub async fn has_transitions(&self, project_id: &str) -> Result<bool> {
        self.transitions.has_transitions(project_id).await
    }

    /// Returns the identity for a key, creating it the first time it is seen.
    pub async fn resolve_identity(&self, key: &str, category: EventCategory) -> Result<EventIdentity> {
        self.identities.get_or_create_identity(key, category).await
    }

    /// Looks up one identity by id.
    pub async fn identity(&self, id: &str) -> Result<IdentityRef> {
        self.identities
            .identities_by_ids(&[id.to_string()])
            .await?
            .into_iter()
            .next()
            .map(|identity| identity.to_ref())
            .ok_or_else(|| Error::not_found(NotFoundCode::EventIdentity, format!("event identity {} not found", id)))
    }
}
