//! Storage collaborator interfaces.
//!
//! The engine never talks to a database directly: adapters (in-memory,
//! ClickHouse) implement these traits and are injected at construction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::identity::{EventCategory, EventIdentity};
use crate::percentage::PercentageUpdate;
use crate::session::SessionEvents;
use crate::transition::{Transition, TransitionWrite};

/// Read access to sessions and their events (owned by ingestion).
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Whether the project exists at all.
    async fn project_exists(&self, project_id: &str) -> Result<bool>;

    /// Ids of every project with tracked sessions.
    async fn list_projects(&self) -> Result<Vec<String>>;

    /// Events of one session, `None` if the session does not exist.
    async fn session_events(&self, session_id: &str) -> Result<Option<SessionEvents>>;

    /// Every session of a project with its events.
    async fn project_sessions(&self, project_id: &str) -> Result<Vec<SessionEvents>>;

    /// Ids of sessions whose last event falls in `[after, until)`, across
    /// all projects, oldest last event first.
    async fn sessions_ended_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>>;
}

/// The event identity catalog (owned by the engine).
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Returns the identity for `key`, creating it on first observation.
    async fn get_or_create_identity(&self, key: &str, category: EventCategory) -> Result<EventIdentity>;

    /// Looks up identities by id. Unknown ids are omitted.
    async fn identities_by_ids(&self, ids: &[String]) -> Result<Vec<EventIdentity>>;
}

/// Persistent transition rows (owned by the engine).
#[async_trait]
pub trait TransitionStore: Send + Sync {
    /// Applies a batch of upserts keyed by `(from, to, project)`.
    ///
    /// Implementations must not create duplicate rows for one key.
    async fn upsert_transitions(&self, writes: &[TransitionWrite]) -> Result<usize>;

    async fn project_transitions(&self, project_id: &str) -> Result<Vec<Transition>>;

    /// Rows leaving `from_id` within the project.
    async fn transitions_from(&self, project_id: &str, from_id: &str) -> Result<Vec<Transition>>;

    /// Rows entering `to_id` within the project.
    async fn transitions_to(&self, project_id: &str, to_id: &str) -> Result<Vec<Transition>>;

    /// Writes one project's percentages as a single batch.
    async fn set_percentages(&self, project_id: &str, updates: &[PercentageUpdate]) -> Result<usize>;

    /// Cheap existence check; must not scan every row.
    async fn has_transitions(&self, project_id: &str) -> Result<bool>;
}
