//! Requirements knowledge graph model
//!
//! - [`entity`]: the four entity kinds and creation commands
//! - [`relationship`]: the nine relationship kinds and their endpoint signatures
//! - [`command`]: typed write commands
//! - [`store`]: the adapter trait every backend implements

pub mod command;
pub mod entity;
pub mod relationship;
pub mod store;

pub use command::{CommandOutcome, GraphCommand, apply_command};
pub use entity::{
    ConceptFields, EntityFields, EntityKind, GraphNode, InstructionFields, NewEntity, NodeRef,
    Properties, RequirementFields, TechniqueFields,
};
pub use relationship::{EdgeRequest, GraphEdge, RelationshipKind};
pub use store::{EdgePolicy, EdgeWrite, GraphStats, GraphStore, ResetSummary};
