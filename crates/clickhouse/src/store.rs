//! ClickHouse implementation of the engine's storage traits.
//!
//! Engine-owned tables are ReplacingMergeTree, so an "upsert" is an insert
//! of a newer version of the row; reads use `FINAL` to see the latest one.
//! Callers must not interleave writes for one project (the engine holds a
//! per-project lock across each write phase).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use tracing::debug;

use transition_core::{
    Error, EventCategory, EventIdentity, EventStore, IdentityStore, PercentageUpdate, Result,
    SessionEvents, Transition, TransitionKey, TransitionStore, TransitionWrite,
};

use crate::client::ClickHouseClient;
use crate::rows::{group_sessions, EventIdentityRow, TrackedEventRow, TransitionRow};

// DateTime64(3) columns travel as Int64 milliseconds in RowBinary
const TRANSITION_COLUMNS: &str = "project_id, from_event_identity_id, to_event_identity_id, count, percentage, avg_duration_ms, updated_at";
const EVENT_COLUMNS: &str = "project_id, session_id, event_identity_id, timestamp, sequence, properties";
const IDENTITY_COLUMNS: &str = "id, key, category, created_at";

#[derive(Debug, Row, Deserialize)]
struct ProjectIdRow {
    project_id: String,
}

#[derive(Debug, Row, Deserialize)]
struct SessionIdRow {
    session_id: String,
}

/// Event, identity, and transition store backed by ClickHouse.
#[derive(Clone)]
pub struct ClickHouseStore {
    client: Arc<ClickHouseClient>,
}

impl ClickHouseStore {
    pub fn new(client: Arc<ClickHouseClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ClickHouseClient {
        &self.client
    }

    async fn insert_rows<T: Row + Serialize + Send + Sync>(&self, table: &str, rows: &[T]) -> Result<()> {
        let mut insert = self
            .client
            .inner()
            .insert(table)
            .map_err(|e| Error::write_failed(format!("Insert error on {}: {}", table, e)))?;

        for row in rows {
            insert
                .write(row)
                .await
                .map_err(|e| Error::write_failed(format!("Write error on {}: {}", table, e)))?;
        }

        insert
            .end()
            .await
            .map_err(|e| Error::write_failed(format!("End error on {}: {}", table, e)))?;
        Ok(())
    }

    async fn fetch_transitions(&self, filter: &str, binds: &[&str]) -> Result<Vec<Transition>> {
        let sql = format!("SELECT {} FROM transitions FINAL WHERE {}", TRANSITION_COLUMNS, filter);
        let mut query = self.client.inner().query(&sql);
        for value in binds {
            query = query.bind(*value);
        }

        let rows: Vec<TransitionRow> = query
            .fetch_all()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;
        Ok(rows.into_iter().map(Transition::from).collect())
    }

    /// Writes new versions of rows for one project.
    async fn write_transitions(&self, rows: &[Transition]) -> Result<()> {
        let rows: Vec<TransitionRow> = rows.iter().map(TransitionRow::from).collect();
        self.insert_rows("transitions", &rows).await
    }
}

#[async_trait]
impl EventStore for ClickHouseStore {
    async fn project_exists(&self, project_id: &str) -> Result<bool> {
        let count: u64 = self
            .client
            .inner()
            .query("SELECT count() FROM projects WHERE project_id = ?")
            .bind(project_id)
            .fetch_one()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;
        Ok(count > 0)
    }

    async fn list_projects(&self) -> Result<Vec<String>> {
        let rows: Vec<ProjectIdRow> = self
            .client
            .inner()
            .query("SELECT DISTINCT project_id FROM projects ORDER BY project_id")
            .fetch_all()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;
        Ok(rows.into_iter().map(|r| r.project_id).collect())
    }

    async fn session_events(&self, session_id: &str) -> Result<Option<SessionEvents>> {
        let sql = format!(
            "SELECT {} FROM tracked_events WHERE session_id = ? ORDER BY timestamp, sequence",
            EVENT_COLUMNS
        );
        let rows: Vec<TrackedEventRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(session_id)
            .fetch_all()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;

        Ok(group_sessions(rows).into_iter().next())
    }

    async fn project_sessions(&self, project_id: &str) -> Result<Vec<SessionEvents>> {
        let sql = format!(
            "SELECT {} FROM tracked_events WHERE project_id = ? ORDER BY session_id, timestamp, sequence",
            EVENT_COLUMNS
        );
        let rows: Vec<TrackedEventRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(project_id)
            .fetch_all()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;

        debug!(project_id = %project_id, events = rows.len(), "Loaded project events");
        Ok(group_sessions(rows))
    }

    async fn sessions_ended_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let rows: Vec<SessionIdRow> = self
            .client
            .inner()
            .query(
                "SELECT session_id FROM tracked_events \
                 GROUP BY session_id \
                 HAVING max(timestamp) >= fromUnixTimestamp64Milli(?) \
                    AND max(timestamp) < fromUnixTimestamp64Milli(?) \
                 ORDER BY max(timestamp), session_id",
            )
            .bind(after.timestamp_millis())
            .bind(until.timestamp_millis())
            .fetch_all()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;
        Ok(rows.into_iter().map(|r| r.session_id).collect())
    }
}

#[async_trait]
impl IdentityStore for ClickHouseStore {
    async fn get_or_create_identity(&self, key: &str, category: EventCategory) -> Result<EventIdentity> {
        let sql = format!("SELECT {} FROM event_identities FINAL WHERE key = ? LIMIT 1", IDENTITY_COLUMNS);
        let existing: Option<EventIdentityRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(key)
            .fetch_optional()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;

        if let Some(row) = existing {
            return EventIdentity::try_from(row);
        }

        // Ids derive from keys, so a racing creator writes the same row
        let identity = EventIdentity::new(key, category)?;
        self.insert_rows("event_identities", &[EventIdentityRow::from(&identity)])
            .await?;
        debug!(key = %key, id = %identity.id, "Created event identity");
        Ok(identity)
    }

    async fn identities_by_ids(&self, ids: &[String]) -> Result<Vec<EventIdentity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM event_identities FINAL WHERE id IN ?", IDENTITY_COLUMNS);
        let rows: Vec<EventIdentityRow> = self
            .client
            .inner()
            .query(&sql)
            .bind(ids)
            .fetch_all()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;

        rows.into_iter().map(EventIdentity::try_from).collect()
    }
}

#[async_trait]
impl TransitionStore for ClickHouseStore {
    async fn upsert_transitions(&self, writes: &[TransitionWrite]) -> Result<usize> {
        if writes.is_empty() {
            return Ok(0);
        }

        let mut by_project: HashMap<&str, Vec<&TransitionWrite>> = HashMap::new();
        for write in writes {
            by_project.entry(write.key.project_id.as_str()).or_default().push(write);
        }

        let now = Utc::now();
        let mut written = 0;
        for (project_id, project_writes) in by_project {
            let existing: HashMap<TransitionKey, Transition> = self
                .project_transitions(project_id)
                .await?
                .into_iter()
                .map(|t| (t.key(), t))
                .collect();

            let rows: Vec<Transition> = project_writes
                .iter()
                .map(|w| w.apply(existing.get(&w.key), now))
                .collect();

            self.write_transitions(&rows).await?;
            written += rows.len();
        }

        Ok(written)
    }

    async fn project_transitions(&self, project_id: &str) -> Result<Vec<Transition>> {
        self.fetch_transitions("project_id = ?", &[project_id]).await
    }

    async fn transitions_from(&self, project_id: &str, from_id: &str) -> Result<Vec<Transition>> {
        self.fetch_transitions(
            "project_id = ? AND from_event_identity_id = ?",
            &[project_id, from_id],
        )
        .await
    }

    async fn transitions_to(&self, project_id: &str, to_id: &str) -> Result<Vec<Transition>> {
        self.fetch_transitions(
            "project_id = ? AND to_event_identity_id = ?",
            &[project_id, to_id],
        )
        .await
    }

    async fn set_percentages(&self, project_id: &str, updates: &[PercentageUpdate]) -> Result<usize> {
        let percentages: HashMap<&TransitionKey, f64> =
            updates.iter().map(|u| (&u.key, u.percentage)).collect();

        let now = Utc::now();
        let rows: Vec<Transition> = self
            .project_transitions(project_id)
            .await?
            .into_iter()
            .filter_map(|t| {
                let percentage = *percentages.get(&t.key())?;
                Some(Transition {
                    percentage,
                    updated_at: now,
                    ..t
                })
            })
            .collect();

        if !rows.is_empty() {
            self.write_transitions(&rows).await?;
        }
        Ok(rows.len())
    }

    async fn has_transitions(&self, project_id: &str) -> Result<bool> {
        let found: Option<u8> = self
            .client
            .inner()
            .query("SELECT 1 FROM transitions WHERE project_id = ? LIMIT 1")
            .bind(project_id)
            .fetch_optional()
            .await
            .map_err(|e| Error::read_failed(format!("Query error: {}", e)))?;
        Ok(found.is_some())
    }
}
