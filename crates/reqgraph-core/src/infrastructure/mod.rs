//! Infrastructure layer
//!
//! Concrete implementations of the domain's store trait.

pub mod graph;

pub use graph::{GraphSessionManager, InMemoryGraphStore, SqliteGraphStore};
