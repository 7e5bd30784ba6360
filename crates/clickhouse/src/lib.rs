//! ClickHouse storage adapter for the transition engine.

pub mod client;
pub mod config;
pub mod health;
pub mod rows;
pub mod schema;
pub mod store;

pub use client::*;
pub use config::*;
pub use store::ClickHouseStore;
