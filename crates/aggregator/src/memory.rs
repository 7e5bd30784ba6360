//! In-memory storage adapter.
//!
//! Implements every store trait over a single mutex-guarded state, so each
//! trait call (including a whole upsert batch) is atomic. Used by tests and
//! for running the engine without ClickHouse.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use transition_core::{
    EventCategory, EventIdentity, EventStore, IdentityStore, PercentageUpdate, Result, SessionEvent,
    SessionEvents, Transition, TransitionKey, TransitionStore, TransitionWrite,
};

#[derive(Debug, Default)]
struct MemoryState {
    projects: HashSet<String>,
    sessions: HashMap<String, SessionEvents>,
    next_sequence: u64,
    identities: HashMap<String, EventIdentity>,
    identity_keys: HashMap<String, String>,
    transitions: BTreeMap<TransitionKey, Transition>,
}

/// Thread-safe in-memory event, identity, and transition store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a project without any sessions.
    pub fn add_project(&self, project_id: impl Into<String>) {
        self.state.lock().projects.insert(project_id.into());
    }

    /// Appends an event to a session, creating the project and session as needed.
    pub fn record_event(
        &self,
        project_id: &str,
        session_id: &str,
        event_identity_id: &str,
        timestamp: DateTime<Utc>,
    ) {
        let mut state = self.state.lock();
        state.projects.insert(project_id.to_string());
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEvents::new(session_id, project_id))
            .events
            .push(SessionEvent::new(event_identity_id, timestamp, sequence));
    }

    /// Inserts an identity with a caller-chosen id.
    pub fn insert_identity(&self, id: &str, key: &str, category: EventCategory) {
        let identity = EventIdentity {
            id: id.to_string(),
            key: key.to_string(),
            category,
            created_at: Utc::now(),
        };
        let mut state = self.state.lock();
        state.identity_keys.insert(key.to_string(), id.to_string());
        state.identities.insert(id.to_string(), identity);
    }

    /// Inserts or replaces a transition row verbatim.
    pub fn insert_transition(&self, transition: Transition) {
        let mut state = self.state.lock();
        state.projects.insert(transition.project_id.clone());
        state.transitions.insert(transition.key(), transition);
    }

    /// Snapshot of every transition row of a project, in key order.
    pub fn transitions_snapshot(&self, project_id: &str) -> Vec<Transition> {
        let state = self.state.lock();
        project_rows(&state.transitions, project_id).cloned().collect()
    }

    pub fn transition_count(&self) -> usize {
        self.state.lock().transitions.len()
    }
}

fn project_rows<'a>(
    transitions: &'a BTreeMap<TransitionKey, Transition>,
    project_id: &'a str,
) -> impl Iterator<Item = &'a Transition> + 'a {
    let start = TransitionKey::new(project_id, "", "");
    transitions
        .range(start..)
        .take_while(move |(key, _)| key.project_id == project_id)
        .map(|(_, t)| t)
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn project_exists(&self, project_id: &str) -> Result<bool> {
        Ok(self.state.lock().projects.contains(project_id))
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let mut projects: Vec<String> = self.state.lock().projects.iter().cloned().collect();
        projects.sort();
        Ok(projects)
    }

    async fn session_events(&self, session_id: &str) -> Result<Option<SessionEvents>> {
        Ok(self.state.lock().sessions.get(session_id).cloned())
    }

    async fn project_sessions(&self, project_id: &str) -> Result<Vec<SessionEvents>> {
        let state = self.state.lock();
        let mut sessions: Vec<SessionEvents> = state
            .sessions
            .values()
            .filter(|s| s.project_id == project_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        Ok(sessions)
    }

    async fn sessions_ended_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let state = self.state.lock();
        let mut ended: Vec<(DateTime<Utc>, String)> = state
            .sessions
            .values()
            .filter_map(|s| {
                let last = s.events.iter().map(|e| e.timestamp).max()?;
                (last >= after && last < until).then(|| (last, s.session_id.clone()))
            })
            .collect();
        ended.sort();
        Ok(ended.into_iter().map(|(_, id)| id).collect())
    }
}

#[async_trait]
impl IdentityStore for MemoryStore {
    async fn get_or_create_identity(&self, key: &str, category: EventCategory) -> Result<EventIdentity> {
        let mut state = self.state.lock();
        if let Some(existing) = state
            .identity_keys
            .get(key)
            .and_then(|id| state.identities.get(id))
        {
            return Ok(existing.clone());
        }

        let identity = EventIdentity::new(key, category)?;
        state.identity_keys.insert(key.to_string(), identity.id.clone());
        state.identities.insert(identity.id.clone(), identity.clone());
        Ok(identity)
    }

    async fn identities_by_ids(&self, ids: &[String]) -> Result<Vec<EventIdentity>> {
        let state = self.state.lock();
        Ok(ids
            .iter()
            .filter_map(|id| state.identities.get(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransitionStore for MemoryStore {
    async fn upsert_transitions(&self, writes: &[TransitionWrite]) -> Result<usize> {
        let now = Utc::now();
        let mut state = self.state.lock();
        for write in writes {
            let row = write.apply(state.transitions.get(&write.key), now);
            state.transitions.insert(write.key.clone(), row);
        }
        Ok(writes.len())
    }

    async fn project_transitions(&self, project_id: &str) -> Result<Vec<Transition>> {
        Ok(self.transitions_snapshot(project_id))
    }

    async fn transitions_from(&self, project_id: &str, from_id: &str) -> Result<Vec<Transition>> {
        let state = self.state.lock();
        Ok(project_rows(&state.transitions, project_id)
            .filter(|t| t.from_event_identity_id == from_id)
            .cloned()
            .collect())
    }

    async fn transitions_to(&self, project_id: &str, to_id: &str) -> Result<Vec<Transition>> {
        let state = self.state.lock();
        Ok(project_rows(&state.transitions, project_id)
            .filter(|t| t.to_event_identity_id == to_id)
            .cloned()
            .collect())
    }

    async fn set_percentages(&self, project_id: &str, updates: &[PercentageUpdate]) -> Result<usize> {
        let now = Utc::now();
        let mut state = self.state.lock();
        let mut written = 0;
        for update in updates.iter().filter(|u| u.key.project_id == project_id) {
            if let Some(row) = state.transitions.get_mut(&update.key) {
                row.percentage = update.percentage;
                row.updated_at = now;
                written += 1;
            }
        }
        Ok(written)
    }

    async fn has_transitions(&self, project_id: &str) -> Result<bool> {
        let state = self.state.lock();
        let found = project_rows(&state.transitions, project_id).next().is_some();
        Ok(found)
    }
}
