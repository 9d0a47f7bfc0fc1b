//! Reqgraph Core Library
//!
//! This crate populates a requirements-engineering knowledge graph:
//! - Graph model (requirements, techniques, instructions, concepts)
//! - Embedding dataset ingestion
//! - Rule-based relationship inference
//! - Store adapters (in-memory, SQLite, optional Neo4j)
//! - Population orchestration and reporting

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::domain::graph::{
        EdgeRequest, EntityKind, GraphStats, GraphStore, NewEntity, NodeRef, RelationshipKind,
    };
    pub use crate::domain::population::{
        PopulationOrchestrator, PopulationReport, PopulationSource, PopulationStage,
    };
    pub use crate::error::{Error, Result};
    pub use crate::infrastructure::GraphSessionManager;
}
