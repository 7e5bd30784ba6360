//! Transition graph types returned to visualization consumers.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};
use crate::identity::IdentityRef;
use crate::limits::{DEFAULT_GRAPH_DEPTH, DEFAULT_TOP_N};
use crate::query::Direction;

/// Traversal options for a transition graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GraphOptions {
    #[serde(default)]
    pub direction: Direction,
    /// Transitions kept per parent, and nodes kept per level
    #[validate(range(min = 1, max = 20))]
    pub top_n: usize,
    /// Levels explored beyond the anchor
    #[validate(range(min = 1, max = 5))]
    pub depth: u32,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            direction: Direction::Forward,
            top_n: DEFAULT_TOP_N,
            depth: DEFAULT_GRAPH_DEPTH,
        }
    }
}

impl GraphOptions {
    pub fn new(direction: Direction, top_n: usize, depth: u32) -> Self {
        Self {
            direction,
            top_n,
            depth,
        }
    }

    /// Rejects options outside the traversal bounds.
    pub fn validated(self) -> Result<Self> {
        self.validate()
            .map_err(|e| Error::validation(format!("invalid graph options: {}", e)))?;
        Ok(self)
    }
}

/// A node in the transition graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub key: String,
    pub level: u32,
    pub count: u64,
    /// Volume that ends at this node (forward graphs only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exits: Option<u64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_aggregate: bool,
}

/// A directed edge, always oriented along the user path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub count: u64,
    pub percentage: f64,
    pub avg_duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_aggregate: bool,
}

/// A bounded multi-level view around an anchor identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionGraph {
    pub anchor: IdentityRef,
    pub direction: Direction,
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl TransitionGraph {
    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_at_level(&self, level: u32) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(move |n| n.level == level)
    }

    pub fn edges_into(&self, id: &str) -> impl Iterator<Item = &GraphEdge> + '_ {
        let id = id.to_string();
        self.edges.iter().filter(move |e| e.to == id)
    }

    /// Deepest level that holds at least one node.
    pub fn max_level(&self) -> u32 {
        self.nodes.iter().map(|n| n.level).max().unwrap_or(0)
    }
}
