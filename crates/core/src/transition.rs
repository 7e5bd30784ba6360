//! Transition records and upsert semantics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::PairAggregate;

/// Unique key of a transition within a project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionKey {
    pub project_id: String,
    pub from_event_identity_id: String,
    pub to_event_identity_id: String,
}

impl TransitionKey {
    pub fn new(
        project_id: impl Into<String>,
        from_event_identity_id: impl Into<String>,
        to_event_identity_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            from_event_identity_id: from_event_identity_id.into(),
            to_event_identity_id: to_event_identity_id.into(),
        }
    }
}

/// A directed, counted edge between two event identities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transition {
    pub project_id: String,
    pub from_event_identity_id: String,
    pub to_event_identity_id: String,
    pub count: u64,
    /// Share of `count` among all transitions leaving the same source (0-100)
    pub percentage: f64,
    pub avg_duration_ms: Option<i64>,
    pub updated_at: DateTime<Utc>,
}

impl Transition {
    pub fn key(&self) -> TransitionKey {
        TransitionKey::new(
            self.project_id.clone(),
            self.from_event_identity_id.clone(),
            self.to_event_identity_id.clone(),
        )
    }

    fn from_aggregate(key: &TransitionKey, aggregate: &PairAggregate, now: DateTime<Utc>) -> Self {
        Self {
            project_id: key.project_id.clone(),
            from_event_identity_id: key.from_event_identity_id.clone(),
            to_event_identity_id: key.to_event_identity_id.clone(),
            count: aggregate.count,
            percentage: 0.0,
            avg_duration_ms: aggregate.avg_duration_ms(),
            updated_at: now,
        }
    }
}

/// How a write combines with an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Full recompute: overwrite count and average.
    Replace,
    /// Incremental update: add to count, fold into the running average.
    Increment,
}

/// A pending upsert for one transition key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionWrite {
    pub key: TransitionKey,
    pub mode: WriteMode,
    pub aggregate: PairAggregate,
}

impl TransitionWrite {
    pub fn replace(key: TransitionKey, aggregate: PairAggregate) -> Self {
        Self {
            key,
            mode: WriteMode::Replace,
            aggregate,
        }
    }

    pub fn increment(key: TransitionKey, aggregate: PairAggregate) -> Self {
        Self {
            key,
            mode: WriteMode::Increment,
            aggregate,
        }
    }

    /// Computes the row that results from applying this write.
    ///
    /// Percentages are carried over unchanged; they are rewritten by the
    /// percentage pass that follows every write batch.
    pub fn apply(&self, existing: Option<&Transition>, now: DateTime<Utc>) -> Transition {
        let Some(existing) = existing else {
            return Transition::from_aggregate(&self.key, &self.aggregate, now);
        };

        let (count, avg_duration_ms) = match self.mode {
            WriteMode::Replace => (self.aggregate.count, self.aggregate.avg_duration_ms()),
            WriteMode::Increment => {
                let count = existing.count + self.aggregate.count;
                let avg = match existing.avg_duration_ms {
                    Some(old_avg) if existing.count > 0 && count > 0 => {
                        let weighted =
                            old_avg as f64 * existing.count as f64 + self.aggregate.total_duration_ms as f64;
                        Some((weighted / count as f64).round() as i64)
                    }
                    _ => self.aggregate.avg_duration_ms(),
                };
                (count, avg)
            }
        };

        Transition {
            count,
            avg_duration_ms,
            updated_at: now,
            ..existing.clone()
        }
    }
}
