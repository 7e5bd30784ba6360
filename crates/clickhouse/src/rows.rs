//! Row types and conversions between ClickHouse and engine types.

use chrono::{DateTime, TimeZone, Utc};
use clickhouse::Row;
use serde::{Deserialize, Serialize};
use transition_core::{
    Error, EventCategory, EventIdentity, Result, SessionEvent, SessionEvents, Transition,
};

/// A project registered by ingestion.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct ProjectRow {
    pub project_id: String,
    pub created_at: i64,
}

/// One tracked event as stored by ingestion.
#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct TrackedEventRow {
    pub project_id: String,
    pub session_id: String,
    pub event_identity_id: String,
    pub timestamp: i64, // milliseconds since epoch
    pub sequence: u64,
    pub properties: String,
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct EventIdentityRow {
    pub id: String,
    pub key: String,
    pub category: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Row, Serialize, Deserialize)]
pub struct TransitionRow {
    pub project_id: String,
    pub from_event_identity_id: String,
    pub to_event_identity_id: String,
    pub count: u64,
    pub percentage: f64,
    pub avg_duration_ms: Option<i64>,
    pub updated_at: i64,
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

impl From<&EventIdentity> for EventIdentityRow {
    fn from(identity: &EventIdentity) -> Self {
        Self {
            id: identity.id.clone(),
            key: identity.key.clone(),
            category: identity.category.as_str().to_string(),
            created_at: identity.created_at.timestamp_millis(),
        }
    }
}

impl TryFrom<EventIdentityRow> for EventIdentity {
    type Error = Error;

    fn try_from(row: EventIdentityRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            key: row.key,
            category: EventCategory::parse(&row.category)?,
            created_at: from_millis(row.created_at),
        })
    }
}

impl From<&Transition> for TransitionRow {
    fn from(t: &Transition) -> Self {
        Self {
            project_id: t.project_id.clone(),
            from_event_identity_id: t.from_event_identity_id.clone(),
            to_event_identity_id: t.to_event_identity_id.clone(),
            count: t.count,
            percentage: t.percentage,
            avg_duration_ms: t.avg_duration_ms,
            updated_at: t.updated_at.timestamp_millis(),
        }
    }
}

impl From<TransitionRow> for Transition {
    fn from(row: TransitionRow) -> Self {
        Self {
            project_id: row.project_id,
            from_event_identity_id: row.from_event_identity_id,
            to_event_identity_id: row.to_event_identity_id,
            count: row.count,
            percentage: row.percentage,
            avg_duration_ms: row.avg_duration_ms,
            updated_at: from_millis(row.updated_at),
        }
    }
}

impl From<TrackedEventRow> for SessionEvent {
    fn from(row: TrackedEventRow) -> Self {
        let properties = if row.properties.is_empty() {
            serde_json::Value::Null
        } else {
            // Properties are opaque to the engine; keep unparseable payloads as strings
            serde_json::from_str(&row.properties).unwrap_or(serde_json::Value::String(row.properties))
        };
        Self {
            event_identity_id: row.event_identity_id,
            timestamp: from_millis(row.timestamp),
            sequence: row.sequence,
            properties,
        }
    }
}

/// Groups rows ordered by `(session_id, timestamp, sequence)` into sessions.
pub fn group_sessions(rows: Vec<TrackedEventRow>) -> Vec<SessionEvents> {
    let mut sessions: Vec<SessionEvents> = Vec::new();

    for row in rows {
        let same_session = sessions
            .last()
            .map(|s| s.session_id == row.session_id)
            .unwrap_or(false);
        if !same_session {
            sessions.push(SessionEvents::new(row.session_id.clone(), row.project_id.clone()));
        }
        if let Some(session) = sessions.last_mut() {
            session.events.push(SessionEvent::from(row));
        }
    }

    sessions
}
