//! Traversal bounds and engine defaults.
//!
//! Graph traversal cost grows with `top_n ^ depth`, so both are capped.
//! The `#[validate]` derive on `GraphOptions` requires literal values,
//! so the caps are duplicated there. Keep both in sync when modifying.

// === Graph Limits ===

/// Maximum BFS depth for a transition graph.
pub const MAX_GRAPH_DEPTH: u32 = 5;

/// Maximum transitions kept per parent and per level.
pub const MAX_GRAPH_TOP_N: usize = 20;

/// Default number of transitions returned by top-K queries.
pub const DEFAULT_TOP_N: usize = 5;

/// Default traversal depth.
pub const DEFAULT_GRAPH_DEPTH: u32 = 3;

// === Recompute Limits ===

/// Deadline for a full project recompute (seconds).
///
/// A full recompute is O(sessions x events) and can be triggered from a
/// user-facing graph request.
pub const DEFAULT_RECOMPUTE_TIMEOUT_SECS: u64 = 30;

/// Projects recomputed concurrently during a sweep.
pub const DEFAULT_MAX_CONCURRENT_PROJECTS: usize = 4;

/// Pending incremental updates buffered before producers wait.
pub const DEFAULT_SESSION_QUEUE_CAPACITY: usize = 1024;

/// Inactivity after a session's last event before it counts as closed (seconds).
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 30 * 60;
