//! Bounded breadth-first transition graph traversal.
//!
//! Each level issues one top-K query per parent (concurrently), merges the
//! results by target (fan-in), then ranks the merged targets once more for
//! the whole level. Parents whose transitions were cut get a synthetic
//! "+N more" node so truncation is visible without fetching the tail.

use std::collections::HashMap;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{debug, info};

use telemetry::metrics;
use transition_core::{
    rank_order, Direction, Error, GraphEdge, GraphNode, GraphOptions, IdentityRef, Result,
    TopTransition, TopTransitionsPage, TransitionGraph,
};

use crate::engine::TransitionEngine;

impl TransitionEngine {
    /// Builds the transition graph around an anchor identity.
    ///
    /// A project without any transitions is recomputed first when
    /// `auto_materialize` is enabled.
    pub async fn build_transition_graph(
        &self,
        project_id: &str,
        anchor_id: &str,
        options: GraphOptions,
    ) -> Result<TransitionGraph> {
        let options = options.validated()?;
        let start = Instant::now();

        if self.config.auto_materialize && !self.has_transitions(project_id).await? {
            info!(project_id = %project_id, "No transitions yet, materializing before traversal");
            metrics().lazy_materializations.inc();
            self.compute_transitions_for_project(project_id).await?;
        }

        let anchor = self.identity(anchor_id).await?;
        let graph = GraphBuilder::new(self.clone(), options)
            .build(project_id, anchor)
            .await?;

        metrics().graphs_built.inc();
        metrics()
            .graph_latency_ms
            .observe(start.elapsed().as_millis() as u64);
        Ok(graph)
    }
}

/// Level-by-level graph expansion over repeated top-K queries.
pub struct GraphBuilder {
    engine: TransitionEngine,
    options: GraphOptions,
}

/// Accumulates nodes and edges while guarding against revisits.
struct GraphState {
    direction: Direction,
    nodes: Vec<GraphNode>,
    index: HashMap<String, usize>,
    edges: Vec<GraphEdge>,
}

impl GraphState {
    fn new(anchor: &IdentityRef, direction: Direction) -> Self {
        let mut state = Self {
            direction,
            nodes: Vec::new(),
            index: HashMap::new(),
            edges: Vec::new(),
        };
        state.push_node(GraphNode {
            id: anchor.id.clone(),
            key: anchor.key.clone(),
            level: 0,
            count: 0,
            exits: None,
            is_aggregate: false,
        });
        state
    }

    fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    fn push_node(&mut self, node: GraphNode) {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        let idx = *self.index.get(id)?;
        self.nodes.get_mut(idx)
    }

    /// Adds an edge oriented along the user path.
    fn push_edge(&mut self, parent: &str, other: &str, entry: &TopTransition, is_aggregate: bool) {
        let (from, to) = match self.direction {
            Direction::Forward => (parent, other),
            Direction::Backward => (other, parent),
        };
        self.edges.push(GraphEdge {
            from: from.to_string(),
            to: to.to_string(),
            count: entry.count,
            percentage: entry.percentage,
            avg_duration_ms: entry.avg_duration_ms,
            is_aggregate,
        });
    }
}

impl GraphBuilder {
    pub fn new(engine: TransitionEngine, options: GraphOptions) -> Self {
        Self { engine, options }
    }

    pub async fn build(&self, project_id: &str, anchor: IdentityRef) -> Result<TransitionGraph> {
        let direction = self.options.direction;
        let top_n = self.options.top_n;
        let mut state = GraphState::new(&anchor, direction);
        let mut frontier = vec![anchor.id.clone()];

        for level in 1..=self.options.depth {
            let pages = self.fetch_level(project_id, &frontier).await?;

            for (parent, page) in &pages {
                if let Some(node) = state.node_mut(parent) {
                    if node.level == 0 {
                        node.count = page.total_count;
                    } else if direction == Direction::Forward {
                        node.exits = Some(node.count.saturating_sub(page.total_count));
                    }
                }
            }

            // Fan-in: merge every parent's view of a not-yet-placed target.
            let mut fan_in: HashMap<&str, (&IdentityRef, u64)> = HashMap::new();
            for (_, page) in &pages {
                for entry in &page.entries {
                    if state.contains(&entry.event.id) {
                        continue;
                    }
                    fan_in
                        .entry(entry.event.id.as_str())
                        .or_insert((&entry.event, 0))
                        .1 += entry.count;
                }
            }

            let mut ranked: Vec<(&IdentityRef, u64)> = fan_in.into_values().collect();
            ranked.sort_by(|a, b| rank_order(a.1, a.0, b.1, b.0));
            ranked.truncate(top_n);

            let mut next_frontier = Vec::with_capacity(ranked.len());
            for (identity, count) in ranked {
                state.push_node(GraphNode {
                    id: identity.id.clone(),
                    key: identity.key.clone(),
                    level,
                    count,
                    exits: None,
                    is_aggregate: false,
                });
                next_frontier.push(identity.id.clone());
            }

            for (parent, page) in &pages {
                for entry in &page.entries {
                    if state.contains(&entry.event.id) {
                        state.push_edge(parent, &entry.event.id, entry, false);
                    }
                }

                if page.is_truncated() {
                    let more_id = format!("more:{}", parent);
                    let summary = TopTransition {
                        event: IdentityRef {
                            id: more_id.clone(),
                            key: format!("+{} more", page.excluded_rows),
                        },
                        count: page.excluded_count,
                        percentage: page.excluded_percentage,
                        avg_duration_ms: None,
                    };
                    state.push_node(GraphNode {
                        id: more_id.clone(),
                        key: summary.event.key.clone(),
                        level,
                        count: page.excluded_count,
                        exits: None,
                        is_aggregate: true,
                    });
                    state.push_edge(parent, &more_id, &summary, true);
                }
            }

            debug!(
                project_id = %project_id,
                level = level,
                parents = pages.len(),
                discovered = next_frontier.len(),
                "Expanded graph level"
            );

            if next_frontier.is_empty() {
                break;
            }
            frontier = next_frontier;
        }

        Ok(TransitionGraph {
            anchor,
            direction,
            nodes: state.nodes,
            edges: state.edges,
        })
    }

    /// Runs one top-K query per parent concurrently and joins them all.
    ///
    /// Results come back in frontier order so ranking is deterministic.
    async fn fetch_level(
        &self,
        project_id: &str,
        frontier: &[String],
    ) -> Result<Vec<(String, TopTransitionsPage)>> {
        let mut tasks = JoinSet::new();
        for (idx, parent) in frontier.iter().enumerate() {
            let engine = self.engine.clone();
            let project_id = project_id.to_string();
            let parent = parent.clone();
            let direction = self.options.direction;
            let top_n = self.options.top_n;
            tasks.spawn(async move {
                let page = engine
                    .top_transitions(&project_id, &parent, direction, top_n)
                    .await;
                (idx, parent, page)
            });
        }

        let mut results = Vec::with_capacity(frontier.len());
        while let Some(joined) = tasks.join_next().await {
            let (idx, parent, page) =
                joined.map_err(|e| Error::internal(format!("top-k query task failed: {}", e)))?;
            results.push((idx, parent, page?));
        }
        results.sort_by_key(|(idx, _, _)| *idx);

        Ok(results
            .into_iter()
            .map(|(_, parent, page)| (parent, page))
            .collect())
    }
}
