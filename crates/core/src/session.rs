//! Session event streams as read by the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sequence::SequenceItem;

/// A single tracked occurrence within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub event_identity_id: String,
    pub timestamp: DateTime<Utc>,
    /// Insertion order within the session, used to order equal timestamps
    pub sequence: u64,
    #[serde(default)]
    pub properties: serde_json::Value,
}

impl SessionEvent {
    pub fn new(event_identity_id: impl Into<String>, timestamp: DateTime<Utc>, sequence: u64) -> Self {
        Self {
            event_identity_id: event_identity_id.into(),
            timestamp,
            sequence,
            properties: serde_json::Value::Null,
        }
    }
}

/// All events of one session, owned by exactly one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvents {
    pub session_id: String,
    pub project_id: String,
    pub events: Vec<SessionEvent>,
}

impl SessionEvents {
    pub fn new(session_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            project_id: project_id.into(),
            events: Vec::new(),
        }
    }

    /// Returns the `(identity, timestamp)` timeline ordered by timestamp,
    /// then insertion sequence.
    pub fn timeline(&self) -> Vec<SequenceItem> {
        let mut events: Vec<&SessionEvent> = self.events.iter().collect();
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });
        events
            .into_iter()
            .map(|e| SequenceItem::new(e.event_identity_id.clone(), e.timestamp))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
