//! Transition aggregation, top-K queries, and graph traversal.
//!
//! [`TransitionEngine`] is the single entry point: it reads session event
//! streams through an [`EventStore`](transition_core::EventStore), derives
//! transitions, and persists them through a
//! [`TransitionStore`](transition_core::TransitionStore).

pub mod config;
pub mod engine;
pub mod graph;
pub mod locks;
pub mod memory;
pub mod topk;

pub use config::*;
pub use engine::*;
pub use graph::GraphBuilder;
pub use locks::ProjectLocks;
pub use memory::MemoryStore;
