//! Top-K query results.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::identity::IdentityRef;
use crate::transition::Transition;

/// Which endpoint of a transition the anchor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Anchor is the source; results are where users went next.
    #[default]
    Forward,
    /// Anchor is the target; results are where users came from.
    Backward,
}

impl Direction {
    /// Id of the endpoint opposite the anchor.
    pub fn other_end<'a>(&self, transition: &'a Transition) -> &'a str {
        match self {
            Self::Forward => &transition.to_event_identity_id,
            Self::Backward => &transition.from_event_identity_id,
        }
    }
}

/// One ranked transition, paired with the resolved non-anchor identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopTransition {
    /// The `toEvent` for forward queries, the `fromEvent` for backward ones
    pub event: IdentityRef,
    pub count: u64,
    pub percentage: f64,
    pub avg_duration_ms: Option<i64>,
}

/// A top-K result plus what the cut left out.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TopTransitionsPage {
    pub entries: Vec<TopTransition>,
    /// Rows touching the anchor before truncation
    pub total_rows: usize,
    /// Summed count of every row touching the anchor
    pub total_count: u64,
    /// Rows dropped by the cut
    pub excluded_rows: usize,
    /// Summed count of the dropped rows
    pub excluded_count: u64,
    /// Summed percentage of the dropped rows
    pub excluded_percentage: f64,
}

/// Orders ranked entries: count descending, then key, then id.
pub fn rank_order(a_count: u64, a: &IdentityRef, b_count: u64, b: &IdentityRef) -> Ordering {
    b_count
        .cmp(&a_count)
        .then_with(|| a.key.cmp(&b.key))
        .then_with(|| a.id.cmp(&b.id))
}

impl TopTransitionsPage {
    /// Ranks resolved entries and keeps the first `top_n`.
    pub fn from_ranked(mut entries: Vec<TopTransition>, top_n: usize) -> Self {
        entries.sort_by(|a, b| rank_order(a.count, &a.event, b.count, &b.event));

        let total_rows = entries.len();
        let total_count = entries.iter().map(|e| e.count).sum();

        let excluded = if entries.len() > top_n {
            entries.split_off(top_n)
        } else {
            Vec::new()
        };

        Self {
            entries,
            total_rows,
            total_count,
            excluded_rows: excluded.len(),
            excluded_count: excluded.iter().map(|e| e.count).sum(),
            excluded_percentage: excluded.iter().map(|e| e.percentage).sum(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.excluded_rows > 0
    }
}
