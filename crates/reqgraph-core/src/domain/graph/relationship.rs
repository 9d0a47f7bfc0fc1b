//! Relationship kinds and edge requests
//!
//! Relationships are directed, many-to-many edges. Each kind admits a fixed
//! set of (source, target) entity-kind pairs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::entity::EntityKind::{Concept, Instruction, Requirement, Technique};
use super::entity::{EntityKind, NodeRef};

/// Types of relationships between entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    /// Requirement is elicited or specified with a technique
    UsesTechnique,
    /// Instruction refers to a concept
    RefersTo,
    /// Requirement touches on a concept
    IsRelatedTo,
    /// Requirement is classified as a concept
    IsA,
    /// Technique or instruction applies to a concept
    AppliesTo,
    /// Instruction recommends a technique
    SuggestsTechnique,
    /// Requirement is backed by an instruction
    SupportedBy,
    /// Requirement was elicited by a technique
    ElicitedBy,
    /// Technique follows an instruction
    Follows,
}

impl RelationshipKind {
    /// Get the graph label for this relationship kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsesTechnique => "USES_TECHNIQUE",
            Self::RefersTo => "REFERS_TO",
            Self::IsRelatedTo => "IS_RELATED_TO",
            Self::IsA => "IS_A",
            Self::AppliesTo => "APPLIES_TO",
            Self::SuggestsTechnique => "SUGGESTS_TECHNIQUE",
            Self::SupportedBy => "SUPPORTED_BY",
            Self::ElicitedBy => "ELICITED_BY",
            Self::Follows => "FOLLOWS",
        }
    }

    /// Parse from a label (case-insensitive, `-` and `_` interchangeable)
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        Self::all().iter().copied().find(|k| k.as_str() == normalized)
    }

    /// Get all relationship kinds
    pub fn all() -> &'static [RelationshipKind] {
        &[
            Self::UsesTechnique,
            Self::RefersTo,
            Self::IsRelatedTo,
            Self::IsA,
            Self::AppliesTo,
            Self::SuggestsTechnique,
            Self::SupportedBy,
            Self::ElicitedBy,
            Self::Follows,
        ]
    }

    /// Allowed (source, target) kind pairs
    pub fn signatures(&self) -> &'static [(EntityKind, EntityKind)] {
        match self {
            Self::UsesTechnique => &[(Requirement, Technique)],
            Self::RefersTo => &[(Instruction, Concept)],
            Self::IsRelatedTo => &[(Requirement, Concept)],
            Self::IsA => &[(Requirement, Concept)],
            Self::AppliesTo => &[(Technique, Concept), (Instruction, Concept)],
            Self::SuggestsTechnique => &[(Instruction, Technique)],
            Self::SupportedBy => &[(Requirement, Instruction)],
            Self::ElicitedBy => &[(Requirement, Technique)],
            Self::Follows => &[(Technique, Instruction)],
        }
    }

    /// Check whether an edge between the given kinds is well-typed
    pub fn allows(&self, source: EntityKind, target: EntityKind) -> bool {
        self.signatures().contains(&(source, target))
    }
}

impl std::fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed request to connect two existing nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRequest {
    pub kind: RelationshipKind,
    pub from: NodeRef,
    pub to: NodeRef,
}

impl EdgeRequest {
    /// Build an edge request, rejecting endpoint kinds the relationship does not admit
    pub fn new(kind: RelationshipKind, from: NodeRef, to: NodeRef) -> Result<Self> {
        if !kind.allows(from.kind, to.kind) {
            return Err(Error::InvalidInput(format!(
                "{} cannot connect {} to {}",
                kind, from.kind, to.kind
            )));
        }

        Ok(Self { kind, from, to })
    }
}

impl std::fmt::Display for EdgeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}

/// An edge as persisted by a graph store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub uid: String,
    pub kind: RelationshipKind,
    pub source_uid: String,
    pub target_uid: String,
    pub created_at: DateTime<Utc>,
}
