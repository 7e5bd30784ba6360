//! Background workers for the transition engine.
//!
//! - Transition sweep (periodic full recompute of every project)
//! - Closed session poller feeding the session queue
//! - Session queue (incremental updates as sessions finish)
//! - Metrics snapshot logging

pub mod scheduler;
pub mod session_poll;
pub mod session_queue;
pub mod transition_job;

pub use scheduler::*;
pub use session_poll::SessionPoller;
pub use session_queue::{QueueError, SessionQueue};
pub use transition_job::{ProjectFailure, SweepReport, TransitionJob};
