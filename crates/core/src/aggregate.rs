//! Pair aggregation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sequence::TransitionPair;

/// Count and summed duration for one `(from, to)` group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairAggregate {
    pub count: u64,
    pub total_duration_ms: i64,
}

impl PairAggregate {
    pub fn observe(&mut self, duration_ms: i64) {
        self.count += 1;
        self.total_duration_ms += duration_ms;
    }

    pub fn merge(&mut self, other: PairAggregate) {
        self.count += other.count;
        self.total_duration_ms += other.total_duration_ms;
    }

    /// Rounded mean duration, `None` for an empty group.
    pub fn avg_duration_ms(&self) -> Option<i64> {
        if self.count == 0 {
            None
        } else {
            Some((self.total_duration_ms as f64 / self.count as f64).round() as i64)
        }
    }
}

/// Aggregates keyed by `(from, to)`.
///
/// Backed by a `BTreeMap` so iteration (and therefore write order) is stable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionAggregates {
    groups: BTreeMap<(String, String), PairAggregate>,
}

impl TransitionAggregates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds aggregates from any collection of pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = &'a TransitionPair>) -> Self {
        let mut aggregates = Self::new();
        aggregates.extend(pairs);
        aggregates
    }

    pub fn add(&mut self, pair: &TransitionPair) {
        self.groups
            .entry((pair.from.clone(), pair.to.clone()))
            .or_default()
            .observe(pair.duration_ms);
    }

    pub fn extend<'a>(&mut self, pairs: impl IntoIterator<Item = &'a TransitionPair>) {
        for pair in pairs {
            self.add(pair);
        }
    }

    /// Folds another aggregate set into this one.
    pub fn merge(&mut self, other: TransitionAggregates) {
        for (key, agg) in other.groups {
            self.groups.entry(key).or_default().merge(agg);
        }
    }

    pub fn get(&self, from: &str, to: &str) -> Option<&PairAggregate> {
        self.groups.get(&(from.to_string(), to.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &PairAggregate)> {
        self.groups
            .iter()
            .map(|((from, to), agg)| (from.as_str(), to.as_str(), agg))
    }

    /// Total number of pairs folded in.
    pub fn pair_count(&self) -> u64 {
        self.groups.values().map(|a| a.count).sum()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
