//! Mock implementations for testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use aggregator::MemoryStore;
use transition_core::{
    Error, EventCategory, EventIdentity, EventStore, IdentityStore, PercentageUpdate, Result,
    SessionEvents, Transition, TransitionStore, TransitionWrite,
};

/// Store that delegates to a `MemoryStore` but can be told to misbehave.
///
/// Implements the same storage traits as the real ClickHouse adapter, so
/// the engine runs its production code paths against it.
#[derive(Clone)]
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    /// Fail every transition read.
    fail_reads: Arc<Mutex<bool>>,
    /// Fail every transition write.
    fail_writes: Arc<Mutex<bool>>,
    /// Acknowledge one fewer percentage row than requested.
    short_percentage_batch: Arc<Mutex<bool>>,
    /// Delay before loading a project's sessions.
    session_delay: Arc<Mutex<Option<Duration>>>,
    /// Delay before writing a percentage batch.
    percentage_delay: Arc<Mutex<Option<Duration>>>,
}

impl FaultyStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            fail_reads: Arc::new(Mutex::new(false)),
            fail_writes: Arc::new(Mutex::new(false)),
            short_percentage_batch: Arc::new(Mutex::new(false)),
            session_delay: Arc::new(Mutex::new(None)),
            percentage_delay: Arc::new(Mutex::new(None)),
        }
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn set_fail_reads(&self, fail: bool) {
        *self.fail_reads.lock() = fail;
    }

    pub fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.lock() = fail;
    }

    pub fn set_short_percentage_batch(&self, short: bool) {
        *self.short_percentage_batch.lock() = short;
    }

    pub fn set_session_delay(&self, delay: Option<Duration>) {
        *self.session_delay.lock() = delay;
    }

    pub fn set_percentage_delay(&self, delay: Option<Duration>) {
        *self.percentage_delay.lock() = delay;
    }

    fn check_read(&self) -> Result<()> {
        if *self.fail_reads.lock() {
            return Err(Error::read_failed("mock read failure"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        if *self.fail_writes.lock() {
            return Err(Error::write_failed("mock write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for FaultyStore {
    async fn project_exists(&self, project_id: &str) -> Result<bool> {
        self.inner.project_exists(project_id).await
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        self.inner.list_projects().await
    }

    async fn session_events(&self, session_id: &str) -> Result<Option<SessionEvents>> {
        self.inner.session_events(session_id).await
    }

    async fn project_sessions(&self, project_id: &str) -> Result<Vec<SessionEvents>> {
        let delay = *self.session_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.project_sessions(project_id).await
    }

    async fn sessions_ended_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        self.inner.sessions_ended_between(after, until).await
    }
}

#[async_trait]
impl IdentityStore for FaultyStore {
    async fn get_or_create_identity(&self, key: &str, category: EventCategory) -> Result<EventIdentity> {
        self.inner.get_or_create_identity(key, category).await
    }

    async fn identities_by_ids(&self, ids: &[String]) -> Result<Vec<EventIdentity>> {
        self.inner.identities_by_ids(ids).await
    }
}

#[async_trait]
impl TransitionStore for FaultyStore {
    async fn upsert_transitions(&self, writes: &[TransitionWrite]) -> Result<usize> {
        self.check_write()?;
        self.inner.upsert_transitions(writes).await
    }

    async fn project_transitions(&self, project_id: &str) -> Result<Vec<Transition>> {
        self.check_read()?;
        self.inner.project_transitions(project_id).await
    }

    async fn transitions_from(&self, project_id: &str, from_id: &str) -> Result<Vec<Transition>> {
        self.check_read()?;
        self.inner.transitions_from(project_id, from_id).await
    }

    async fn transitions_to(&self, project_id: &str, to_id: &str) -> Result<Vec<Transition>> {
        self.check_read()?;
        self.inner.transitions_to(project_id, to_id).await
    }

    async fn set_percentages(&self, project_id: &str, updates: &[PercentageUpdate]) -> Result<usize> {
        self.check_write()?;
        let delay = *self.percentage_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let written = self.inner.set_percentages(project_id, updates).await?;
        if *self.short_percentage_batch.lock() {
            return Ok(written.saturating_sub(1));
        }
        Ok(written)
    }

    async fn has_transitions(&self, project_id: &str) -> Result<bool> {
        self.check_read()?;
        self.inner.has_transitions(project_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_faulty_store_failure_modes() {
        let store = FaultyStore::new(Arc::new(MemoryStore::new()));
        assert!(!store.has_transitions("p").await.unwrap());

        store.set_fail_reads(true);
        assert!(store.has_transitions("p").await.is_err());

        store.set_fail_reads(false);
        store.set_fail_writes(true);
        assert!(store.upsert_transitions(&[]).await.is_err());
    }
}
