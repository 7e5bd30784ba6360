//! Sequence collapsing and pair extraction.
//!
//! A session timeline is first debounced (consecutive repeats of the same
//! identity collapse to their first occurrence), then walked pairwise to
//! produce transitions. Pairs never cross session boundaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One `(identity, timestamp)` point on a session timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceItem {
    pub event_identity_id: String,
    pub timestamp: DateTime<Utc>,
}

impl SequenceItem {
    pub fn new(event_identity_id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_identity_id: event_identity_id.into(),
            timestamp,
        }
    }
}

/// An observed move from one identity to the next within a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPair {
    pub from: String,
    pub to: String,
    pub duration_ms: i64,
}

/// Collapses runs of identical consecutive identities to their first occurrence.
pub fn collapse(sequence: &[SequenceItem]) -> Vec<SequenceItem> {
    let mut collapsed: Vec<SequenceItem> = Vec::with_capacity(sequence.len());

    for item in sequence {
        match collapsed.last() {
            Some(last) if last.event_identity_id == item.event_identity_id => {}
            _ => collapsed.push(item.clone()),
        }
    }

    collapsed
}

/// Produces adjacent pairs from a collapsed sequence.
///
/// Durations are clamped at zero so out-of-order input cannot produce
/// negative averages. Adjacent duplicates are skipped, so passing an
/// uncollapsed sequence still never yields a self-transition.
pub fn extract_pairs(collapsed: &[SequenceItem]) -> Vec<TransitionPair> {
    collapsed
        .windows(2)
        .filter(|w| w[0].event_identity_id != w[1].event_identity_id)
        .map(|w| TransitionPair {
            from: w[0].event_identity_id.clone(),
            to: w[1].event_identity_id.clone(),
            duration_ms: (w[1].timestamp - w[0].timestamp).num_milliseconds().max(0),
        })
        .collect()
}

/// Collapses then extracts pairs for one session timeline.
pub fn session_pairs(sequence: &[SequenceItem]) -> Vec<TransitionPair> {
    extract_pairs(&collapse(sequence))
}
