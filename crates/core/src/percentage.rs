//! Per-source percentage calculation.

use std::collections::HashMap;

use crate::transition::{Transition, TransitionKey};

/// New percentage for one transition row.
#[derive(Debug, Clone, PartialEq)]
pub struct PercentageUpdate {
    pub key: TransitionKey,
    pub percentage: f64,
}

/// Computes each row's share of its source's total outgoing count.
///
/// A source whose counts sum to zero uses a denominator of 1, which leaves
/// every one of its rows at 0%.
pub fn compute_percentages(transitions: &[Transition]) -> Vec<PercentageUpdate> {
    let mut source_totals: HashMap<&str, u64> = HashMap::new();
    for t in transitions {
        *source_totals.entry(t.from_event_identity_id.as_str()).or_default() += t.count;
    }

    transitions
        .iter()
        .map(|t| {
            let total = source_totals
                .get(t.from_event_identity_id.as_str())
                .copied()
                .unwrap_or(0);
            let denominator = if total == 0 { 1 } else { total };
            PercentageUpdate {
                key: t.key(),
                percentage: t.count as f64 / denominator as f64 * 100.0,
            }
        })
        .collect()
}
