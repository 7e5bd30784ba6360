//! Core types, sequence math, and storage traits for the transition engine.

pub mod aggregate;
pub mod error;
pub mod graph;
pub mod identity;
pub mod limits;
pub mod percentage;
pub mod query;
pub mod sequence;
pub mod session;
pub mod store;
pub mod transition;

pub use aggregate::*;
pub use error::{Error, Result};
pub use graph::*;
pub use identity::*;
pub use percentage::*;
pub use query::*;
pub use sequence::*;
pub use session::*;
pub use store::*;
pub use transition::*;
