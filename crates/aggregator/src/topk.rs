//! Top-K transition queries.

use std::collections::HashMap;

use tracing::warn;

use telemetry::metrics;
use transition_core::{
    Direction, EventIdentity, IdentityRef, Result, TopTransition, TopTransitionsPage,
};

use crate::engine::TransitionEngine;

impl TransitionEngine {
    /// Most frequent next steps after `anchor_id`, ordered by count.
    pub async fn get_top_transitions_from_event(
        &self,
        project_id: &str,
        anchor_id: &str,
        top_n: usize,
    ) -> Result<Vec<TopTransition>> {
        Ok(self
            .top_transitions(project_id, anchor_id, Direction::Forward, top_n)
            .await?
            .entries)
    }

    /// Most frequent steps leading into `anchor_id`, ordered by count.
    pub async fn get_top_transitions_to_event(
        &self,
        project_id: &str,
        anchor_id: &str,
        top_n: usize,
    ) -> Result<Vec<TopTransition>> {
        Ok(self
            .top_transitions(project_id, anchor_id, Direction::Backward, top_n)
            .await?
            .entries)
    }

    /// Ranked transitions touching the anchor, plus what the cut excluded.
    ///
    /// Ties on count are broken by the non-anchor identity key, then id.
    /// A `top_n` of 0 uses the configured default.
    pub async fn top_transitions(
        &self,
        project_id: &str,
        anchor_id: &str,
        direction: Direction,
        top_n: usize,
    ) -> Result<TopTransitionsPage> {
        metrics().top_k_queries.inc();
        let top_n = if top_n == 0 { self.config.default_top_n } else { top_n };

        let rows = match direction {
            Direction::Forward => self.transitions.transitions_from(project_id, anchor_id).await?,
            Direction::Backward => self.transitions.transitions_to(project_id, anchor_id).await?,
        };
        if rows.is_empty() {
            return Ok(TopTransitionsPage::default());
        }

        let mut ids: Vec<String> = rows
            .iter()
            .map(|t| direction.other_end(t).to_string())
            .collect();
        ids.sort_unstable();
        ids.dedup();

        let identities = self.identities.identities_by_ids(&ids).await?;
        let by_id: HashMap<&str, &EventIdentity> =
            identities.iter().map(|i| (i.id.as_str(), i)).collect();

        let entries = rows
            .iter()
            .map(|t| {
                let other = direction.other_end(t);
                let event = match by_id.get(other) {
                    Some(identity) => identity.to_ref(),
                    None => {
                        warn!(
                            project_id = %project_id,
                            event_identity_id = %other,
                            "Transition references unknown event identity"
                        );
                        IdentityRef {
                            id: other.to_string(),
                            key: other.to_string(),
                        }
                    }
                };
                TopTransition {
                    event,
                    count: t.count,
                    percentage: t.percentage,
                    avg_duration_ms: t.avg_duration_ms,
                }
            })
            .collect();

        Ok(TopTransitionsPage::from_ranked(entries, top_n))
    }
}
