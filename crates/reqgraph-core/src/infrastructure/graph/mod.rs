//! Graph store adapters and the session manager

pub mod memory;
#[cfg(feature = "neo4j")]
pub mod neo4j;
pub mod session;
pub mod sqlite;

pub use memory::InMemoryGraphStore;
#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jGraphStore;
pub use session::GraphSessionManager;
pub use sqlite::SqliteGraphStore;
